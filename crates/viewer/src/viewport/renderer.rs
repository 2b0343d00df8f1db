//! Backend-neutral frame description and the GPU resource seam

use glam::{Mat4, Vec3};
use image::RgbaImage;

use super::clipping::Plane;
use super::mesh::{LineMeshData, MeshData, TriangleData};

/// Opaque id of an uploaded resource. Released exactly once by its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub(crate) u64);

/// Draw-time surface state of one object
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Linear RGB in [0, 1]
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    /// Lines: use per-vertex colors instead of `color`
    pub vertex_colors: bool,
    /// Shade with scene lights; unlit materials output `color` directly
    pub lit: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub wireframe: bool,
    pub double_sided: bool,
    pub metalness: f32,
    pub roughness: f32,
    pub clipping_planes: Vec<Plane>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            transparent: false,
            vertex_colors: false,
            lit: false,
            depth_test: true,
            depth_write: true,
            wireframe: false,
            double_sided: false,
            metalness: 0.0,
            roughness: 1.0,
            clipping_planes: Vec::new(),
        }
    }
}

impl Material {
    /// Lit surface material used for the loaded model
    pub fn standard(color: [f32; 3]) -> Self {
        Self {
            color,
            lit: true,
            double_sided: true,
            metalness: 0.1,
            roughness: 0.8,
            ..Default::default()
        }
    }

    /// Unlit lines using their vertex colors
    pub fn vertex_colored_lines() -> Self {
        Self {
            vertex_colors: true,
            ..Default::default()
        }
    }

    /// Unlit material that ignores depth (overlays)
    pub fn overlay(color: [f32; 3]) -> Self {
        Self {
            color,
            depth_test: false,
            depth_write: false,
            double_sided: true,
            ..Default::default()
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent && self.opacity < 1.0
    }
}

/// What a draw item rasterizes
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Shaded triangles (uploaded with `upload_mesh` or `upload_triangles`)
    Triangles,
    /// Line segments (uploaded with `upload_lines`)
    Lines,
    /// Camera-facing textured quad centered at `center`, `height_px` tall on screen
    Sprite { center: Vec3, height_px: f32 },
    /// World-space quad showing the item's texture. Corners run counter-clockwise
    /// seen from the front, starting at the image's bottom-left.
    TexturedQuad { corners: [Vec3; 4] },
}

/// One object in a frame
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub handle: GpuHandle,
    pub primitive: Primitive,
    pub material: Material,
    /// World translation applied to the resource's vertices
    pub offset: Vec3,
    pub render_order: i32,
}

/// Everything needed to draw one frame
#[derive(Clone, Debug)]
pub struct Frame {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    /// Clear color (linear RGB)
    pub clear_color: [f32; 3],
    /// Scene background drawn over the clear color; `None` shows the clear color
    pub background: Option<[f32; 3]>,
    pub items: Vec<DrawItem>,
    /// Corner passes drawn after `items`
    pub insets: Vec<Inset>,
}

/// Secondary pass with its own camera, drawn into a pixel rectangle of the
/// frame. Depth is cleared inside the rectangle; color is kept.
#[derive(Clone, Debug)]
pub struct Inset {
    /// [x, y, width, height] in frame pixels, origin top-left
    pub rect: [u32; 4],
    pub view: Mat4,
    pub projection: Mat4,
    pub items: Vec<DrawItem>,
}

impl Inset {
    pub fn sorted_items(&self) -> Vec<&DrawItem> {
        sort_items(&self.items)
    }
}

impl Frame {
    /// Color the framebuffer starts from
    pub fn effective_background(&self) -> [f32; 3] {
        self.background.unwrap_or(self.clear_color)
    }

    /// Items in draw order: opaque, then transparent, each by ascending render order
    pub fn sorted_items(&self) -> Vec<&DrawItem> {
        sort_items(&self.items)
    }
}

fn sort_items(items: &[DrawItem]) -> Vec<&DrawItem> {
    let mut items: Vec<&DrawItem> = items.iter().collect();
    items.sort_by_key(|item| (item.material.is_transparent(), item.render_order));
    items
}

/// GPU resource owner and rasterizer.
///
/// Implementations must be deterministic for identical frames so that captures
/// can be compared.
pub trait RenderBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuHandle;
    fn upload_lines(&mut self, lines: &LineMeshData) -> GpuHandle;
    fn upload_triangles(&mut self, triangles: &TriangleData) -> GpuHandle;
    fn upload_texture(&mut self, texture: &RgbaImage) -> GpuHandle;
    /// Free a resource. Unknown handles are ignored.
    fn release(&mut self, handle: GpuHandle);
    fn resize(&mut self, width: u32, height: u32);
    fn size(&self) -> [u32; 2];
    fn render(&mut self, frame: &Frame);
    /// The last rendered frame. May rasterize on demand.
    fn read_pixels(&mut self) -> RgbaImage;
    fn live_resources(&self) -> usize;
}

/// Release `slot`'s handle (if any) and leave it empty
pub fn release_slot<B: RenderBackend + ?Sized>(backend: &mut B, slot: &mut Option<GpuHandle>) {
    if let Some(handle) = slot.take() {
        backend.release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, transparent: bool, order: i32) -> DrawItem {
        DrawItem {
            handle: GpuHandle(id),
            primitive: Primitive::Triangles,
            material: Material {
                transparent,
                opacity: if transparent { 0.3 } else { 1.0 },
                ..Default::default()
            },
            offset: Vec3::ZERO,
            render_order: order,
        }
    }

    #[test]
    fn test_sorted_items_opaque_first_then_order() {
        let frame = Frame {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            clear_color: [1.0; 3],
            background: None,
            items: vec![item(1, false, 999), item(2, true, 0), item(3, false, 0)],
            insets: vec![],
        };
        let ids: Vec<u64> = frame.sorted_items().iter().map(|i| i.handle.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_inset_items_use_the_same_order() {
        let inset = Inset {
            rect: [0, 0, 10, 10],
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            items: vec![item(7, true, 1001), item(8, false, 0)],
        };
        let ids: Vec<u64> = inset.sorted_items().iter().map(|i| i.handle.0).collect();
        assert_eq!(ids, vec![8, 7]);
    }

    #[test]
    fn test_effective_background() {
        let mut frame = Frame {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            clear_color: [1.0; 3],
            background: Some([0.5; 3]),
            items: vec![],
            insets: vec![],
        };
        assert_eq!(frame.effective_background(), [0.5; 3]);
        frame.background = None;
        assert_eq!(frame.effective_background(), [1.0; 3]);
    }
}
