//! Measurement overlay: segment, two arrowheads and a text label
//!
//! Geometry is a pure function of (p1, p2, label, scale, camera position).
//! Every change replaces the previous overlay wholesale.

use glam::Vec3;

use super::label;
use super::mesh::{hex_to_rgb, LineMeshData, TriangleData};
use super::renderer::{release_slot, DrawItem, GpuHandle, Material, Primitive, RenderBackend};

pub const MIN_GRAPHICS_SCALE: f32 = 0.1;
pub const MAX_GRAPHICS_SCALE: f32 = 4.0;
pub const SEGMENT_RENDER_ORDER: i32 = 999;
pub const LABEL_RENDER_ORDER: i32 = 1000;
/// Label height as a fraction of the half-viewport, before the fov factor
const LABEL_HEIGHT: f32 = 0.2;

/// Clamp to [0.1, 4]; non-finite input falls back to 1
pub fn clamp_graphics_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_GRAPHICS_SCALE, MAX_GRAPHICS_SCALE)
    } else {
        1.0
    }
}

/// Where and what the label shows
#[derive(Clone, Debug, PartialEq)]
pub struct LabelPlacement {
    pub text: String,
    pub position: Vec3,
}

/// Derived overlay geometry in world space
#[derive(Clone, Debug)]
pub struct OverlayGeometry {
    pub segment: LineMeshData,
    pub arrows: [TriangleData; 2],
    pub label: Option<LabelPlacement>,
}

fn reference_axis(dir: Vec3) -> Vec3 {
    if dir.dot(Vec3::Y).abs() > 0.9 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

/// Build the overlay for a segment. `None` for a zero-length or non-finite segment.
pub fn build_overlay(
    p1: Vec3,
    p2: Vec3,
    label: Option<&str>,
    scale: f32,
    camera_position: Vec3,
) -> Option<OverlayGeometry> {
    let delta = p2 - p1;
    let len = delta.length();
    if !len.is_finite() || len <= 0.0 {
        return None;
    }
    let dir = delta / len;

    // Lift toward the viewer so the overlay does not sink into the surface
    let mid = (p1 + p2) * 0.5;
    let view_dir = (camera_position - mid).normalize_or_zero();
    let lift = view_dir * (len * 0.02 + 2.0 * scale);
    let p1o = p1 + lift;
    let p2o = p2 + lift;

    let mut segment = LineMeshData::default();
    segment.push_segment(p1o, p2o, [0.0, 0.0, 0.0, 1.0]);

    let side = dir.cross(reference_axis(dir)).normalize();
    let arrow_length = (len * 0.07).max(5.0 * scale);
    let half_width = arrow_length * 0.4;

    let arrow = |tip: Vec3, back: Vec3| {
        let base = tip + back * arrow_length;
        let mut t = TriangleData::default();
        t.push_triangle(tip, base + side * half_width, base - side * half_width);
        t
    };
    let arrows = [arrow(p1o, dir), arrow(p2o, -dir)];

    let label = label.map(|text| {
        let offset = (len * 0.03).max(5.0 * scale);
        LabelPlacement {
            text: text.to_string(),
            position: (p1o + p2o) * 0.5 + reference_axis(dir) * offset,
        }
    });

    Some(OverlayGeometry {
        segment,
        arrows,
        label,
    })
}

/// On-screen label height in pixels
pub fn label_height_px(scale: f32, fov_deg: f32, viewport_height: u32) -> f32 {
    let focal = 1.0 / (fov_deg.to_radians() * 0.5).tan();
    LABEL_HEIGHT * scale * focal * viewport_height as f32 * 0.5
}

/// Overlay colors. Outline captures swap these to black and back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub segment_color: u32,
    pub arrow_color: u32,
    /// Multiplies the label texture
    pub label_tint: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            segment_color: 0x000000,
            arrow_color: 0x000000,
            label_tint: 0xffffff,
        }
    }
}

impl OverlayStyle {
    pub fn black() -> Self {
        Self {
            segment_color: 0x000000,
            arrow_color: 0x000000,
            label_tint: 0x000000,
        }
    }
}

/// Inputs the current overlay was built from
#[derive(Clone, Debug, PartialEq)]
struct OverlayInputs {
    p1: Vec3,
    p2: Vec3,
    label: Option<String>,
}

/// GPU-side measurement overlay. Sole owner of its handles.
#[derive(Debug, Default)]
pub struct MeasurementOverlay {
    inputs: Option<OverlayInputs>,
    segment: Option<GpuHandle>,
    arrows: [Option<GpuHandle>; 2],
    label: Option<(GpuHandle, Vec3)>,
}

impl MeasurementOverlay {
    /// Number of live overlay entities (segment, arrows, label)
    pub fn entity_count(&self) -> usize {
        self.segment.iter().count()
            + self.arrows.iter().flatten().count()
            + self.label.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// Release every overlay resource and forget the inputs
    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        self.release(backend);
        self.inputs = None;
    }

    fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        release_slot(backend, &mut self.segment);
        for slot in &mut self.arrows {
            release_slot(backend, slot);
        }
        if let Some((handle, _)) = self.label.take() {
            backend.release(handle);
        }
    }

    /// Replace the overlay. A degenerate segment leaves it empty.
    pub fn set_segment<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        p1: Vec3,
        p2: Vec3,
        label: Option<&str>,
        scale: f32,
        camera_position: Vec3,
    ) {
        self.release(backend);
        self.inputs = Some(OverlayInputs {
            p1,
            p2,
            label: label.map(str::to_string),
        });

        let Some(geom) = build_overlay(p1, p2, label, scale, camera_position) else {
            tracing::debug!("degenerate measurement, overlay cleared");
            self.inputs = None;
            return;
        };

        self.segment = Some(backend.upload_lines(&geom.segment));
        for (slot, arrow) in self.arrows.iter_mut().zip(geom.arrows.iter()) {
            *slot = Some(backend.upload_triangles(arrow));
        }
        if let Some(placement) = geom.label {
            let texture = label::rasterize(&placement.text);
            self.label = Some((backend.upload_texture(&texture), placement.position));
        }
    }

    /// Rebuild from the stored inputs (after a graphics-scale change)
    pub fn rebuild<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, scale: f32, camera_position: Vec3) {
        if let Some(inputs) = self.inputs.clone() {
            self.set_segment(
                backend,
                inputs.p1,
                inputs.p2,
                inputs.label.as_deref(),
                scale,
                camera_position,
            );
        }
    }

    /// Draw items with depth testing off and high render order
    pub fn draw_items(&self, style: &OverlayStyle, label_height_px: f32) -> Vec<DrawItem> {
        let mut items = Vec::new();
        if let Some(handle) = self.segment {
            items.push(DrawItem {
                handle,
                primitive: Primitive::Lines,
                material: Material::overlay(hex_to_rgb(style.segment_color)),
                offset: Vec3::ZERO,
                render_order: SEGMENT_RENDER_ORDER,
            });
        }
        for handle in self.arrows.iter().flatten() {
            items.push(DrawItem {
                handle: *handle,
                primitive: Primitive::Triangles,
                material: Material::overlay(hex_to_rgb(style.arrow_color)),
                offset: Vec3::ZERO,
                render_order: SEGMENT_RENDER_ORDER,
            });
        }
        if let Some((handle, center)) = self.label {
            let mut material = Material::overlay(hex_to_rgb(style.label_tint));
            material.transparent = true;
            items.push(DrawItem {
                handle,
                primitive: Primitive::Sprite {
                    center,
                    height_px: label_height_px,
                },
                material,
                offset: Vec3::ZERO,
                render_order: LABEL_RENDER_ORDER,
            });
        }
        items
    }
}
