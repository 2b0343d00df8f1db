//! Orientation cube in the bottom-right corner of the viewport
//!
//! The cube is drawn as an inset pass with its own orthographic camera and
//! turns with the inverse of the main camera, so its faces show the world axes
//! the way the camera sees them. Clicking a face selects that view preset;
//! clicking near an edge or corner swings the camera onto the diagonal.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use shared::ViewPreset;

use super::camera::FALLBACK_DISTANCE;
use super::highlight::ease_out_cubic;
use super::label;
use super::mesh::{hex_to_rgb, hex_to_rgba, LineMeshData};
use super::renderer::{release_slot, DrawItem, GpuHandle, Inset, Material, Primitive, RenderBackend};

/// Inset edge length (pixels)
pub const CUBE_SIZE_PX: u32 = 140;
/// Gap between the inset and the viewport's right and bottom edges (pixels)
pub const CUBE_MARGIN_PX: u32 = 12;
/// Half extent of the cube in its camera space
pub const HALF: f32 = 0.4;
pub const HOVER_THRESHOLD: f32 = 0.7;
pub const CLICK_THRESHOLD: f32 = 0.78;
/// Seconds for a diagonal snap
pub const SNAP_DURATION: f64 = 0.3;
const SNAP_FIT: f32 = 1.25;

const FACE_COLOR: u32 = 0xf8fafc;
const HOVER_COLOR: u32 = 0xdbeafe;
const EDGE_COLOR: u32 = 0x9ca3af;
const EDGE_OPACITY: f32 = 0.85;
const EDGE_RENDER_ORDER: i32 = 1001;
const TRIAD_LENGTH: f32 = 0.48;
const TRIAD_OFFSET: f32 = 0.016;
const CAMERA_Z: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    pub fn caption(self) -> &'static str {
        match self {
            CubeFace::PosX => "Right",
            CubeFace::NegX => "Left",
            CubeFace::PosY => "Top",
            CubeFace::NegY => "Bottom",
            CubeFace::PosZ => "Front",
            CubeFace::NegZ => "Back",
        }
    }

    /// View preset selected by clicking the face
    pub fn preset(self) -> ViewPreset {
        match self {
            CubeFace::PosX => ViewPreset::Right,
            CubeFace::NegX => ViewPreset::Left,
            CubeFace::PosY => ViewPreset::Top,
            CubeFace::NegY => ViewPreset::Bottom,
            CubeFace::PosZ => ViewPreset::Front,
            CubeFace::NegZ => ViewPreset::Back,
        }
    }

    pub fn normal(self) -> Vec3 {
        match self {
            CubeFace::PosX => Vec3::X,
            CubeFace::NegX => Vec3::NEG_X,
            CubeFace::PosY => Vec3::Y,
            CubeFace::NegY => Vec3::NEG_Y,
            CubeFace::PosZ => Vec3::Z,
            CubeFace::NegZ => Vec3::NEG_Z,
        }
    }

    fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => CubeFace::PosX,
            (0, false) => CubeFace::NegX,
            (1, true) => CubeFace::PosY,
            (1, false) => CubeFace::NegY,
            (_, true) => CubeFace::PosZ,
            (_, false) => CubeFace::NegZ,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Caption right and up directions seen from outside the face
    fn basis(self) -> (Vec3, Vec3) {
        match self {
            CubeFace::PosX => (Vec3::NEG_Z, Vec3::Y),
            CubeFace::NegX => (Vec3::Z, Vec3::Y),
            CubeFace::PosY => (Vec3::X, Vec3::NEG_Z),
            CubeFace::NegY => (Vec3::X, Vec3::Z),
            CubeFace::PosZ => (Vec3::X, Vec3::Y),
            CubeFace::NegZ => (Vec3::NEG_X, Vec3::Y),
        }
    }

    /// Counter-clockwise from the caption's bottom-left
    fn corners(self) -> [Vec3; 4] {
        let (right, up) = self.basis();
        let c = self.normal() * HALF;
        let (r, u) = (right * HALF, up * HALF);
        [c - r - u, c + r - u, c + r + u, c - r + u]
    }
}

/// What a point on the cube surface selects
#[derive(Clone, Debug, PartialEq)]
pub enum CubeTarget {
    /// Central region of a face
    Face(CubeFace),
    /// Edge or corner region: the faces that meet there and the unit
    /// direction from the orbit target toward the new camera position
    Diagonal { faces: Vec<CubeFace>, direction: Vec3 },
}

impl CubeTarget {
    /// Faces lit while hovering this target
    pub fn faces(&self) -> Vec<CubeFace> {
        match self {
            CubeTarget::Face(face) => vec![*face],
            CubeTarget::Diagonal { faces, .. } => faces.clone(),
        }
    }
}

/// Classify a cube-local surface point. Coordinates are normalized by the
/// half extent; an axis counts as near when it exceeds `threshold`.
pub fn classify(local: Vec3, threshold: f32) -> CubeTarget {
    let n = local / HALF;
    let abs = n.abs();
    let hit_axis = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };

    let near: Vec<usize> = (0..3).filter(|&axis| abs[axis] > threshold).collect();
    if near.len() < 2 {
        return CubeTarget::Face(CubeFace::from_axis(hit_axis, n[hit_axis] >= 0.0));
    }
    let mut direction = Vec3::ZERO;
    let faces = near
        .iter()
        .map(|&axis| {
            let positive = n[axis] >= 0.0;
            direction[axis] = if positive { 1.0 } else { -1.0 };
            CubeFace::from_axis(axis, positive)
        })
        .collect();
    CubeTarget::Diagonal {
        faces,
        direction: direction.normalize(),
    }
}

/// Inset rectangle for a viewport, `None` when the cube does not fit
pub fn inset_rect(viewport: [u32; 2]) -> Option<[u32; 4]> {
    let [w, h] = viewport;
    let needed = CUBE_SIZE_PX + 2 * CUBE_MARGIN_PX;
    if w < needed || h < needed {
        return None;
    }
    Some([
        w - CUBE_MARGIN_PX - CUBE_SIZE_PX,
        h - CUBE_MARGIN_PX - CUBE_SIZE_PX,
        CUBE_SIZE_PX,
        CUBE_SIZE_PX,
    ])
}

/// Camera distance for a diagonal snap: at least the current one, far enough
/// to show the whole model
pub fn snap_distance(current: f32, model_size: Option<Vec3>, fov_deg: f32) -> f32 {
    let mut distance = if current.is_finite() && current >= 1e-3 {
        current
    } else {
        FALLBACK_DISTANCE
    };
    if let Some(size) = model_size {
        let max_dim = size.max_element().max(1.0);
        let suggested = max_dim / 2.0 / (fov_deg.to_radians() / 2.0).tan() * SNAP_FIT;
        distance = distance.max(suggested);
    }
    distance
}

/// Camera-position tween for diagonal snaps, driven by the render loop clock
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapAnimation {
    from: Vec3,
    to: Vec3,
    start: f64,
}

impl SnapAnimation {
    pub fn new(from: Vec3, to: Vec3, start: f64) -> Self {
        Self { from, to, start }
    }

    pub fn destination(&self) -> Vec3 {
        self.to
    }

    /// Position at `now` and whether the tween has finished
    pub fn sample(&self, now: f64) -> (Vec3, bool) {
        let t = ((now - self.start) / SNAP_DURATION).clamp(0.0, 1.0);
        (self.from.lerp(self.to, ease_out_cubic(t) as f32), t >= 1.0)
    }
}

/// Cube resources and interaction state. Sole owner of its GPU buffers.
#[derive(Debug)]
pub struct ViewCube {
    /// Inverse of the main camera's rotation
    rotation: Quat,
    hovered: Vec<CubeFace>,
    faces: [Option<GpuHandle>; 6],
    edges: Option<GpuHandle>,
    triad: Option<GpuHandle>,
}

impl ViewCube {
    pub fn new<B: RenderBackend + ?Sized>(backend: &mut B) -> Self {
        let faces = CubeFace::ALL.map(|face| Some(backend.upload_texture(&label::face_texture(face.caption()))));
        Self {
            rotation: Quat::IDENTITY,
            hovered: Vec::new(),
            faces,
            edges: Some(backend.upload_lines(&edge_lines())),
            triad: Some(backend.upload_lines(&triad_lines())),
        }
    }

    /// Follow the main camera; `view` is its world-to-camera matrix
    pub fn sync(&mut self, view: &Mat4) {
        self.rotation = Quat::from_mat3(&Mat3::from_mat4(*view)).normalize();
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn hovered(&self) -> &[CubeFace] {
        &self.hovered
    }

    /// Cube-camera NDC of a viewport pixel (origin top-left), `None` outside the inset
    fn local_ndc(viewport: [u32; 2], pos: Vec2) -> Option<Vec2> {
        let [x, y, w, h] = inset_rect(viewport)?;
        let u = (pos.x - x as f32) / w as f32;
        let v = (pos.y - y as f32) / h as f32;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        Some(Vec2::new(u * 2.0 - 1.0, 1.0 - v * 2.0))
    }

    /// Cube-local surface point under a cube-camera NDC
    pub fn hit(&self, ndc: Vec2) -> Option<Vec3> {
        let inverse = self.rotation.inverse();
        let origin = inverse * Vec3::new(ndc.x, ndc.y, CAMERA_Z);
        let dir = inverse * Vec3::NEG_Z;

        let (mut t_min, mut t_max) = (f32::NEG_INFINITY, f32::INFINITY);
        for axis in 0..3 {
            if dir[axis].abs() < 1e-9 {
                if origin[axis].abs() > HALF {
                    return None;
                }
                continue;
            }
            let t1 = (-HALF - origin[axis]) / dir[axis];
            let t2 = (HALF - origin[axis]) / dir[axis];
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        (t_max >= t_min && t_min >= 0.0).then(|| origin + dir * t_min)
    }

    /// Update the hover highlight. Returns true while the pointer is over the cube.
    pub fn hover(&mut self, viewport: [u32; 2], pos: Option<Vec2>) -> bool {
        let target = pos
            .and_then(|p| Self::local_ndc(viewport, p))
            .and_then(|ndc| self.hit(ndc))
            .map(|local| classify(local, HOVER_THRESHOLD));
        self.hovered = target.as_ref().map(CubeTarget::faces).unwrap_or_default();
        target.is_some()
    }

    /// What a click at `pos` selects
    pub fn click(&self, viewport: [u32; 2], pos: Vec2) -> Option<CubeTarget> {
        let ndc = Self::local_ndc(viewport, pos)?;
        let local = self.hit(ndc)?;
        Some(classify(local, CLICK_THRESHOLD))
    }

    /// Corner pass for a viewport, `None` when it does not fit
    pub fn inset(&self, viewport: [u32; 2]) -> Option<Inset> {
        let rect = inset_rect(viewport)?;
        let mut items = Vec::with_capacity(8);

        for face in CubeFace::ALL {
            let Some(handle) = self.faces[face.index()] else {
                continue;
            };
            let color = if self.hovered.contains(&face) {
                HOVER_COLOR
            } else {
                FACE_COLOR
            };
            items.push(DrawItem {
                handle,
                primitive: Primitive::TexturedQuad {
                    corners: face.corners(),
                },
                material: Material {
                    color: hex_to_rgb(color),
                    ..Default::default()
                },
                offset: Vec3::ZERO,
                render_order: 0,
            });
        }
        if let Some(handle) = self.edges {
            items.push(DrawItem {
                handle,
                primitive: Primitive::Lines,
                material: Material {
                    vertex_colors: true,
                    transparent: true,
                    opacity: EDGE_OPACITY,
                    ..Default::default()
                },
                offset: Vec3::ZERO,
                render_order: EDGE_RENDER_ORDER,
            });
        }
        if let Some(handle) = self.triad {
            items.push(DrawItem {
                handle,
                primitive: Primitive::Lines,
                material: Material::vertex_colored_lines(),
                offset: Vec3::ZERO,
                render_order: 0,
            });
        }

        let eye = Vec3::new(0.0, 0.0, CAMERA_Z);
        Some(Inset {
            rect,
            view: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y) * Mat4::from_quat(self.rotation),
            projection: Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            items,
        })
    }

    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for slot in &mut self.faces {
            release_slot(backend, slot);
        }
        release_slot(backend, &mut self.edges);
        release_slot(backend, &mut self.triad);
        self.hovered.clear();
    }
}

/// The twelve cube edges
fn edge_lines() -> LineMeshData {
    let mut lines = LineMeshData::default();
    let mut color = hex_to_rgba(EDGE_COLOR);
    color[3] = EDGE_OPACITY;
    let corner = |i: u32| {
        Vec3::new(
            if i & 1 != 0 { HALF } else { -HALF },
            if i & 2 != 0 { HALF } else { -HALF },
            if i & 4 != 0 { HALF } else { -HALF },
        )
    };
    for a in 0..8u32 {
        for bit in [1, 2, 4] {
            if a & bit == 0 {
                lines.push_segment(corner(a), corner(a | bit), color);
            }
        }
    }
    lines
}

/// RGB axis triad anchored just outside the (-x, -y, -z) corner
fn triad_lines() -> LineMeshData {
    let mut lines = LineMeshData::default();
    let origin = Vec3::splat(-HALF) + Vec3::NEG_ONE.normalize() * TRIAD_OFFSET;
    lines.push_segment(origin, origin + Vec3::X * TRIAD_LENGTH, [1.0, 0.0, 0.0, 1.0]);
    lines.push_segment(origin, origin + Vec3::Y * TRIAD_LENGTH, [0.0, 1.0, 0.0, 1.0]);
    lines.push_segment(origin, origin + Vec3::Z * TRIAD_LENGTH, [0.0, 0.0, 1.0, 1.0]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::software::SoftwareBackend;

    #[test]
    fn test_face_to_preset_mapping() {
        let expected = [
            (CubeFace::PosX, ViewPreset::Right),
            (CubeFace::NegX, ViewPreset::Left),
            (CubeFace::PosY, ViewPreset::Top),
            (CubeFace::NegY, ViewPreset::Bottom),
            (CubeFace::PosZ, ViewPreset::Front),
            (CubeFace::NegZ, ViewPreset::Back),
        ];
        for (face, preset) in expected {
            assert_eq!(face.preset(), preset);
            // The preset looks at the face from outside
            assert_eq!(Vec3::from(preset.direction()), face.normal());
        }
    }

    #[test]
    fn test_face_corners_wind_outward() {
        for face in CubeFace::ALL {
            let [a, b, c, _] = face.corners();
            let n = (b - a).cross(c - a).normalize();
            assert!(n.abs_diff_eq(face.normal(), 1e-6), "{face:?}");
        }
    }

    #[test]
    fn test_classify_face_edge_and_corner() {
        assert_eq!(
            classify(Vec3::new(0.1, 0.0, HALF), CLICK_THRESHOLD),
            CubeTarget::Face(CubeFace::PosZ)
        );
        let edge = classify(Vec3::new(0.0, 0.38, HALF), CLICK_THRESHOLD);
        assert_eq!(
            edge,
            CubeTarget::Diagonal {
                faces: vec![CubeFace::PosY, CubeFace::PosZ],
                direction: Vec3::new(0.0, 1.0, 1.0).normalize(),
            }
        );
        let corner = classify(Vec3::new(-0.39, -0.39, -HALF), CLICK_THRESHOLD);
        assert_eq!(corner.faces(), vec![CubeFace::NegX, CubeFace::NegY, CubeFace::NegZ]);
    }

    #[test]
    fn test_hover_threshold_is_looser_than_click() {
        // 0.3 / 0.4 = 0.75 lies between the two thresholds
        let local = Vec3::new(0.3, 0.0, HALF);
        assert!(matches!(classify(local, HOVER_THRESHOLD), CubeTarget::Diagonal { .. }));
        assert_eq!(classify(local, CLICK_THRESHOLD), CubeTarget::Face(CubeFace::PosZ));
    }

    #[test]
    fn test_hit_follows_rotation() {
        let mut cube = ViewCube::new(&mut SoftwareBackend::new(4, 4));
        let center = Vec2::ZERO;
        assert_eq!(cube.hit(center).map(|p| classify(p, CLICK_THRESHOLD)), Some(CubeTarget::Face(CubeFace::PosZ)));

        // Camera looking down from above: the top face faces the viewer
        let view = Mat4::look_at_rh(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::NEG_Z);
        cube.sync(&view);
        assert_eq!(cube.hit(center).map(|p| classify(p, CLICK_THRESHOLD)), Some(CubeTarget::Face(CubeFace::PosY)));
        assert_eq!(cube.hit(Vec2::new(0.95, 0.95)), None);
    }

    #[test]
    fn test_inset_rect_requires_room() {
        assert_eq!(inset_rect([320, 240]), Some([168, 88, 140, 140]));
        assert_eq!(inset_rect([160, 240]), None);
        assert_eq!(inset_rect([320, 163]), None);
    }

    #[test]
    fn test_hover_and_click_use_viewport_pixels() {
        let mut cube = ViewCube::new(&mut SoftwareBackend::new(4, 4));
        let center = Vec2::new(168.0 + 70.0, 88.0 + 70.0);
        assert!(cube.hover([320, 240], Some(center)));
        assert_eq!(cube.hovered(), &[CubeFace::PosZ]);
        assert_eq!(cube.click([320, 240], center), Some(CubeTarget::Face(CubeFace::PosZ)));

        assert!(!cube.hover([320, 240], Some(Vec2::new(10.0, 10.0))));
        assert!(cube.hovered().is_empty());
        assert!(!cube.hover([320, 240], None));
    }

    #[test]
    fn test_snap_distance_and_animation() {
        assert_eq!(snap_distance(f32::NAN, None, 50.0), FALLBACK_DISTANCE);
        assert_eq!(snap_distance(500.0, Some(Vec3::splat(10.0)), 50.0), 500.0);
        let fit = snap_distance(1.0, Some(Vec3::new(100.0, 20.0, 10.0)), 90.0);
        assert!((fit - 62.5).abs() < 1e-3);

        let anim = SnapAnimation::new(Vec3::ZERO, Vec3::X * 10.0, 1.0);
        assert_eq!(anim.sample(1.0), (Vec3::ZERO, false));
        let (mid, done) = anim.sample(1.15);
        assert!(!done && mid.x > 5.0);
        assert_eq!(anim.sample(1.5), (Vec3::X * 10.0, true));
    }

    #[test]
    fn test_release_frees_every_buffer() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut cube = ViewCube::new(&mut backend);
        assert_eq!(backend.live_resources(), 8);
        assert_eq!(cube.inset([400, 400]).map(|i| i.items.len()), Some(8));
        cube.release(&mut backend);
        assert_eq!(backend.live_resources(), 0);
        assert_eq!(cube.inset([400, 400]).map(|i| i.items.len()), Some(0));
    }
}
