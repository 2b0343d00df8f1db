//! Still-image captures that leave the scene exactly as they found it

use std::ops::{Deref, DerefMut};
use std::path::Path;

use base64::Engine as _;
use glam::Vec3;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

use super::overlay::OverlayStyle;
use super::renderer::{DrawItem, GpuHandle, Material, Primitive, RenderBackend};
use super::{SceneState, Viewer};
use crate::error::{Result, ViewerError};

/// A captured frame and its PNG encoding
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub image: RgbaImage,
    pub png: Vec<u8>,
}

impl Snapshot {
    fn encode(image: RgbaImage) -> Result<Self> {
        let png = encode_png(&image)?;
        Ok(Self { image, png })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `data:image/png;base64,...`
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.png)
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(|e| ViewerError::Capture(e.to_string()))?;
    Ok(out)
}

/// Holds the viewer while a capture alters scene state. Dropping the guard
/// restores the saved state and frees any temporary buffers, on every path.
struct SceneGuard<'a, B: RenderBackend> {
    viewer: &'a mut Viewer<B>,
    saved: SceneState,
    temporary: Vec<GpuHandle>,
}

impl<'a, B: RenderBackend> SceneGuard<'a, B> {
    fn new(viewer: &'a mut Viewer<B>) -> Self {
        let saved = viewer.scene.clone();
        Self {
            viewer,
            saved,
            temporary: Vec::new(),
        }
    }

    /// Render once with `extra` items and read the frame back
    fn render_once(&mut self, extra: Vec<DrawItem>) -> RgbaImage {
        let frame = self.viewer.build_frame(extra);
        self.viewer.backend.render(&frame);
        self.viewer.backend.read_pixels()
    }
}

impl<B: RenderBackend> Deref for SceneGuard<'_, B> {
    type Target = Viewer<B>;

    fn deref(&self) -> &Self::Target {
        self.viewer
    }
}

impl<B: RenderBackend> DerefMut for SceneGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.viewer
    }
}

impl<B: RenderBackend> Drop for SceneGuard<'_, B> {
    fn drop(&mut self) {
        for handle in self.temporary.drain(..) {
            self.viewer.backend.release(handle);
        }
        self.viewer.scene = self.saved.clone();
    }
}

impl<B: RenderBackend> Viewer<B> {
    /// Render the scene without grid and axes
    pub fn screenshot(&mut self) -> Result<Snapshot> {
        self.ensure_alive()?;
        let image = {
            let mut guard = SceneGuard::new(self);
            guard.scene.grid_visible = false;
            guard.scene.axes_visible = false;
            guard.scene.view_cube_visible = false;
            guard.render_once(Vec::new())
        };
        Snapshot::encode(image)
    }

    /// Black feature edges and overlay on plain white
    pub fn outline_snapshot(&mut self) -> Result<Snapshot> {
        self.ensure_alive()?;
        let image = {
            let mut guard = SceneGuard::new(self);
            let scene = &mut guard.scene;
            scene.grid_visible = false;
            scene.axes_visible = false;
            scene.model_visible = false;
            scene.highlight_visible = false;
            scene.view_cube_visible = false;
            scene.clear_color = [1.0, 1.0, 1.0];
            scene.background_enabled = false;
            scene.overlay_style = OverlayStyle::black();

            let mut extra = Vec::new();
            if let Some((lines, offset)) = guard.model_outline() {
                let material = Material {
                    vertex_colors: true,
                    clipping_planes: guard.clipping.planes().to_vec(),
                    ..Default::default()
                };
                let handle = guard.backend.upload_lines(&lines);
                guard.temporary.push(handle);
                extra.push(edge_item(handle, material, offset));
            }
            guard.render_once(extra)
        };
        Snapshot::encode(image)
    }

    pub fn screenshot_data_url(&mut self) -> Result<String> {
        Ok(self.screenshot()?.data_url())
    }

    pub fn outline_snapshot_data_url(&mut self) -> Result<String> {
        Ok(self.outline_snapshot()?.data_url())
    }
}

fn edge_item(handle: GpuHandle, material: Material, offset: Vec3) -> DrawItem {
    DrawItem {
        handle,
        primitive: Primitive::Lines,
        material,
        offset,
        render_order: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::settings::ViewerSettings;
    use crate::viewport::software::SoftwareBackend;

    fn viewer() -> Viewer<SoftwareBackend> {
        let mut v = Viewer::new(SoftwareBackend::new(64, 48), &ViewerSettings::default());
        v.load_mesh(&fixtures::box_mesh(20.0, 10.0, 30.0)).unwrap();
        v
    }

    #[test]
    fn test_data_url_prefix_and_png_magic() {
        let mut v = viewer();
        let snap = v.screenshot().unwrap();
        assert_eq!((snap.width(), snap.height()), (64, 48));
        assert_eq!(&snap.png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(snap.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_outline_is_black_on_white() {
        let mut v = viewer();
        v.set_material_properties(0xff0000, false, true);
        let snap = v.outline_snapshot().unwrap();
        for px in snap.image.pixels() {
            let [r, g, b, _] = px.0;
            // Only white background and black (possibly blended) edges
            assert!(r == g && g == b, "unexpected color {:?}", px.0);
        }
        assert!(snap.image.pixels().any(|p| p.0[0] < 64));
    }

    #[test]
    fn test_outline_restores_scene_and_frees_edges() {
        let mut v = viewer();
        let before_state = v.scene_state().clone();
        let before_live = v.live_resources();
        v.outline_snapshot().unwrap();
        assert_eq!(v.scene_state(), &before_state);
        assert_eq!(v.live_resources(), before_live);
    }

    #[test]
    fn test_screenshot_hides_helpers_only_during_capture() {
        let mut v = Viewer::new(SoftwareBackend::new(32, 32), &ViewerSettings::default());
        v.screenshot().unwrap();
        assert!(v.scene_state().grid_visible);
        assert!(v.scene_state().axes_visible);
    }

    /// Software backend that panics on demand mid-capture
    struct PanickingBackend {
        inner: SoftwareBackend,
        fail_render: bool,
        fail_read: bool,
    }

    impl RenderBackend for PanickingBackend {
        fn upload_mesh(&mut self, mesh: &crate::viewport::mesh::MeshData) -> GpuHandle {
            self.inner.upload_mesh(mesh)
        }

        fn upload_lines(&mut self, lines: &crate::viewport::mesh::LineMeshData) -> GpuHandle {
            self.inner.upload_lines(lines)
        }

        fn upload_triangles(&mut self, triangles: &crate::viewport::mesh::TriangleData) -> GpuHandle {
            self.inner.upload_triangles(triangles)
        }

        fn upload_texture(&mut self, texture: &RgbaImage) -> GpuHandle {
            self.inner.upload_texture(texture)
        }

        fn release(&mut self, handle: GpuHandle) {
            self.inner.release(handle)
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.inner.resize(width, height)
        }

        fn size(&self) -> [u32; 2] {
            self.inner.size()
        }

        fn render(&mut self, frame: &crate::viewport::renderer::Frame) {
            if self.fail_render {
                panic!("render failed");
            }
            self.inner.render(frame)
        }

        fn read_pixels(&mut self) -> RgbaImage {
            if self.fail_read {
                panic!("read failed");
            }
            self.inner.read_pixels()
        }

        fn live_resources(&self) -> usize {
            self.inner.live_resources()
        }
    }

    fn panicking_viewer() -> Viewer<PanickingBackend> {
        let backend = PanickingBackend {
            inner: SoftwareBackend::new(64, 48),
            fail_render: false,
            fail_read: false,
        };
        let mut v = Viewer::new(backend, &ViewerSettings::default());
        v.load_mesh(&fixtures::box_mesh(20.0, 10.0, 30.0)).unwrap();
        v.set_helpers_visible(false, true);
        v.set_background_color(0x336699);
        v.set_highlight(Some(&[0, 1]), None);
        v
    }

    #[test]
    fn test_panicking_render_restores_scene_and_frees_edges() {
        let mut v = panicking_viewer();
        let state = v.scene_state().clone();
        let live = v.live_resources();

        v.backend.fail_render = true;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| v.outline_snapshot()));
        assert!(result.is_err());
        assert_eq!(v.scene_state(), &state);
        assert_eq!(v.live_resources(), live);

        // The viewer stays usable
        v.backend.fail_render = false;
        assert!(v.outline_snapshot().is_ok());
        assert_eq!(v.scene_state(), &state);
    }

    #[test]
    fn test_panicking_readback_restores_scene() {
        let mut v = panicking_viewer();
        let state = v.scene_state().clone();
        let live = v.live_resources();

        v.backend.fail_read = true;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| v.screenshot()));
        assert!(result.is_err());
        assert_eq!(v.scene_state(), &state);
        assert!(!v.scene_state().grid_visible && v.scene_state().axes_visible);
        assert_eq!(v.live_resources(), live);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| v.outline_snapshot()));
        assert!(result.is_err());
        assert_eq!(v.scene_state(), &state);
        assert_eq!(v.live_resources(), live);
    }

    #[test]
    fn test_capture_after_dispose_fails() {
        let mut v = viewer();
        v.dispose();
        assert!(matches!(v.screenshot(), Err(ViewerError::Disposed)));
    }
}
