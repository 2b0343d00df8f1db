//! Translucent highlight of selected model triangles and the camera focus
//! animation that goes with it.

use glam::Vec3;

use super::mesh::{hex_to_rgb, TriangleData};
use super::renderer::{release_slot, DrawItem, GpuHandle, Material, Primitive, RenderBackend};

pub const HIGHLIGHT_COLOR: u32 = 0x3b82f6;
pub const HIGHLIGHT_OPACITY: f32 = 0.5;
/// Seconds for the orbit target to reach a focused feature
pub const FOCUS_DURATION: f64 = 1.0;

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Orbit-target tween driven by the render loop clock
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FocusAnimation {
    from: Vec3,
    to: Vec3,
    start: f64,
    duration: f64,
}

impl FocusAnimation {
    pub fn new(from: Vec3, to: Vec3, start: f64) -> Self {
        Self {
            from,
            to,
            start,
            duration: FOCUS_DURATION,
        }
    }

    /// Target at time `now` and whether the tween has finished
    pub fn sample(&self, now: f64) -> (Vec3, bool) {
        let progress = ((now - self.start) / self.duration).clamp(0.0, 1.0);
        let eased = ease_out_cubic(progress) as f32;
        (self.from.lerp(self.to, eased), progress >= 1.0)
    }
}

/// Highlight overlay slot. Sole owner of its GPU buffer.
#[derive(Debug, Default)]
pub struct Highlight {
    handle: Option<GpuHandle>,
    offset: Vec3,
}

impl Highlight {
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Replace the highlight; an empty triangle list just removes it
    pub fn set<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, triangles: &TriangleData, offset: Vec3) {
        self.clear(backend);
        if triangles.triangle_count() == 0 {
            return;
        }
        self.handle = Some(backend.upload_triangles(triangles));
        self.offset = offset;
    }

    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        release_slot(backend, &mut self.handle);
    }

    pub fn draw_item(&self) -> Option<DrawItem> {
        let handle = self.handle?;
        let material = Material {
            color: hex_to_rgb(HIGHLIGHT_COLOR),
            opacity: HIGHLIGHT_OPACITY,
            transparent: true,
            double_sided: true,
            depth_write: false,
            ..Default::default()
        };
        Some(DrawItem {
            handle,
            primitive: Primitive::Triangles,
            material,
            offset: self.offset,
            render_order: 0,
        })
    }
}
