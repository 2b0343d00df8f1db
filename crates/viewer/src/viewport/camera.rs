use std::f32::consts::PI;

use glam::{Mat4, Vec3, Vec4};
use shared::{Projection, ViewPreset};

use super::picking::{Aabb, Ray};

/// Direction from the orbit target toward the camera after a fit
const FIT_DIRECTION: Vec3 = Vec3::new(1.0, 0.8, 1.0);
/// Distance used by `set_view` when the current one is unusable
pub const FALLBACK_DISTANCE: f32 = 300.0;
/// Keeps the polar angle off the poles so the orbit basis stays defined
const POLE_EPS: f32 = 1e-4;

/// Perspective frustum parameters
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view (degrees)
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Orthographic frustum parameters. `zoom` divides the frustum extents.
#[derive(Clone, Debug, PartialEq)]
pub struct OrthographicCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
}

impl OrthographicCamera {
    pub fn projection_matrix(&self) -> Mat4 {
        let z = self.zoom.max(1e-6);
        Mat4::orthographic_rh_gl(
            self.left / z,
            self.right / z,
            self.bottom / z,
            self.top / z,
            self.near,
            self.far,
        )
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// Orbit controller with exponential damping.
///
/// Input methods only accumulate deltas; `update` applies a `damping_factor`
/// fraction of them per frame and decays the remainder.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    pub damping_factor: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitControls {
    fn new() -> Self {
        Self {
            target: Vec3::ZERO,
            damping_factor: 0.1,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    /// Horizontal/vertical rotation request (radians)
    pub fn rotate(&mut self, d_azimuth: f32, d_polar: f32) {
        self.delta_theta -= d_azimuth;
        self.delta_phi -= d_polar;
    }

    /// `factor > 1` moves the camera away, `< 1` moves closer
    pub fn dolly(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
        }
    }

    pub fn pan(&mut self, world_offset: Vec3) {
        self.pan_offset += world_offset;
    }

    /// Drop any pending motion
    pub fn stop(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    fn is_idle(&self) -> bool {
        self.delta_theta.abs() < 1e-6
            && self.delta_phi.abs() < 1e-6
            && (self.scale - 1.0).abs() < 1e-6
            && self.pan_offset.length_squared() < 1e-12
    }
}

/// Perspective + orthographic camera pair sharing one pose; one is active.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub position: Vec3,
    pub up: Vec3,
    pub perspective: PerspectiveCamera,
    pub orthographic: OrthographicCamera,
    pub active: Projection,
    pub orbit: OrbitControls,
    viewport: [u32; 2],
}

impl CameraRig {
    pub fn new(width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let ortho_half = 100.0;
        Self {
            position: Vec3::new(250.0, 180.0, 250.0),
            up: Vec3::Y,
            perspective: PerspectiveCamera {
                fov_deg: 50.0,
                aspect,
                near: 0.1,
                far: 10_000.0,
            },
            orthographic: OrthographicCamera {
                left: -ortho_half * aspect,
                right: ortho_half * aspect,
                top: ortho_half,
                bottom: -ortho_half,
                near: -10_000.0,
                far: 10_000.0,
                zoom: 1.0,
            },
            active: Projection::Perspective,
            orbit: OrbitControls::new(),
            viewport: [width, height],
        }
    }

    pub fn viewport(&self) -> [u32; 2] {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.viewport[0].max(1) as f32 / self.viewport[1].max(1) as f32
    }

    /// Recompute both frusta for a new surface size. Idempotent.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = [width, height];
        let aspect = self.aspect();
        self.perspective.aspect = aspect;
        let half = self.orthographic.height() * 0.5;
        self.orthographic.left = -half * aspect;
        self.orthographic.right = half * aspect;
    }

    pub fn set_projection(&mut self, mode: Projection) {
        self.active = mode;
    }

    /// Distance from the camera to the orbit target
    pub fn distance(&self) -> f32 {
        self.position.distance(self.orbit.target)
    }

    /// Frame `aabb` so it is fully visible; `padding > 1` leaves a margin.
    pub fn fit_to_box(&mut self, aabb: &Aabb, padding: f32) {
        if aabb.is_empty() {
            return;
        }
        let size = aabb.size();
        let center = aabb.center();
        let max_dim = size.x.max(size.y).max(size.z);

        let fov = self.perspective.fov_deg.to_radians();
        let distance = (max_dim / 2.0) / (fov / 2.0).tan() * padding;

        self.position = center + FIT_DIRECTION.normalize() * distance;
        self.up = Vec3::Y;
        self.perspective.near = (distance * 0.01).max(0.1);
        self.perspective.far = distance * 100.0 + max_dim;

        let half = max_dim * padding / 2.0;
        let aspect = self.aspect();
        self.orthographic.left = -half * aspect;
        self.orthographic.right = half * aspect;
        self.orthographic.top = half;
        self.orthographic.bottom = -half;
        self.orthographic.near = -10_000.0;
        self.orthographic.far = 10_000.0;
        self.orthographic.zoom = 1.0;

        self.orbit.target = center;
        self.orbit.stop();

        tracing::debug!(distance, max_dim, padding, "fit camera to box");
    }

    /// Move to a preset direction at the current orbit distance
    pub fn set_view(&mut self, preset: ViewPreset) {
        let target = self.orbit.target;
        let mut dist = self.distance();
        if !dist.is_finite() || dist < 1e-3 {
            dist = FALLBACK_DISTANCE;
        }
        let dir = Vec3::from(preset.direction()).normalize();
        self.position = target + dir * dist;
        self.up = Vec3::Y;
        self.orbit.stop();
    }

    /// Apply one frame of orbit damping. Returns true if the pose changed.
    pub fn update(&mut self) -> bool {
        if self.orbit.is_idle() {
            return false;
        }
        let f = self.orbit.damping_factor;
        let target = self.orbit.target;
        let offset = self.position - target;

        let mut radius = offset.length().max(1e-6);
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.orbit.delta_theta * f;
        phi = (phi + self.orbit.delta_phi * f).clamp(POLE_EPS, PI - POLE_EPS);

        match self.active {
            Projection::Perspective => radius = (radius * self.orbit.scale).max(1e-3),
            Projection::Orthographic => {
                self.orthographic.zoom = (self.orthographic.zoom / self.orbit.scale).clamp(1e-3, 1e3)
            }
        }

        let new_target = target + self.orbit.pan_offset * f;
        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        self.orbit.target = new_target;
        self.position = new_target + new_offset;

        let keep = 1.0 - f;
        self.orbit.delta_theta *= keep;
        self.orbit.delta_phi *= keep;
        self.orbit.pan_offset *= keep;
        self.orbit.scale = 1.0;
        true
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        let forward = (self.orbit.target - self.position).normalize_or_zero();
        let up = if forward.cross(self.up).length_squared() < 1e-8 {
            // Looking straight along the up axis
            if forward.y < 0.0 {
                Vec3::NEG_Z
            } else {
                Vec3::Z
            }
        } else {
            self.up
        };
        Mat4::look_at_rh(self.position, self.orbit.target, up)
    }

    /// Projection matrix of the active camera
    pub fn projection_matrix(&self) -> Mat4 {
        match self.active {
            Projection::Perspective => self.perspective.projection_matrix(),
            Projection::Orthographic => self.orthographic.projection_matrix(),
        }
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Unit vector from the scene toward the viewer at `point`
    pub fn view_direction_at(&self, point: Vec3) -> Vec3 {
        match self.active {
            Projection::Perspective => (self.position - point).normalize_or_zero(),
            Projection::Orthographic => (self.position - self.orbit.target).normalize_or_zero(),
        }
    }

    /// Screen-space basis (right, up) of the current view in world space
    pub fn screen_basis(&self) -> (Vec3, Vec3) {
        let inv = self.view_matrix().inverse();
        (
            inv.transform_vector3(Vec3::X).normalize_or_zero(),
            inv.transform_vector3(Vec3::Y).normalize_or_zero(),
        )
    }

    /// Project a world point to NDC. None if behind the camera.
    pub fn project(&self, point: Vec3) -> Option<Vec3> {
        let p = self.view_projection() * point.extend(1.0);
        if p.w <= 0.0 {
            return None;
        }
        Some(p.truncate() / p.w)
    }

    /// Cast a ray from the active camera through a point in normalized device coordinates
    pub fn screen_ray(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let vp_inv = self.view_projection().inverse();

        let near_world = vp_inv * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far_world = vp_inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        let direction = (far - near).normalize_or_zero();
        let origin = match self.active {
            Projection::Perspective => self.position,
            Projection::Orthographic => near,
        };

        Ray { origin, direction }
    }
}

/// Padding used by `fit_to_screen(zoom)`. Larger zoom means tighter framing.
pub fn zoom_padding(zoom: f32) -> f32 {
    1.3 / zoom.max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb {
            min: Vec3::new(-10.0, 0.0, -10.0),
            max: Vec3::new(10.0, 20.0, 10.0),
        }
    }

    #[test]
    fn test_fit_distance_formula() {
        let mut rig = CameraRig::new(800, 600);
        rig.fit_to_box(&unit_box(), 1.3);
        let expected = (20.0 / 2.0) / (25.0_f32.to_radians()).tan() * 1.3;
        assert!((rig.distance() - expected).abs() < 1e-3);
        assert_eq!(rig.orbit.target, Vec3::new(0.0, 10.0, 0.0));
        assert!((rig.perspective.near - (expected * 0.01).max(0.1)).abs() < 1e-5);
        assert!((rig.perspective.far - (expected * 100.0 + 20.0)).abs() < 1e-2);
    }

    #[test]
    fn test_fit_ortho_frustum_uses_aspect() {
        let mut rig = CameraRig::new(800, 400);
        rig.fit_to_box(&unit_box(), 1.3);
        let half = 20.0 * 1.3 / 2.0;
        assert!((rig.orthographic.top - half).abs() < 1e-4);
        assert!((rig.orthographic.bottom + half).abs() < 1e-4);
        assert!((rig.orthographic.right - half * 2.0).abs() < 1e-4);
        assert!((rig.orthographic.left + half * 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_fit_empty_box_is_noop() {
        let mut rig = CameraRig::new(800, 600);
        let before = rig.position;
        rig.fit_to_box(&Aabb::empty(), 1.3);
        assert_eq!(rig.position, before);
    }

    #[test]
    fn test_zoom_padding_monotonic() {
        assert!(zoom_padding(2.0) < zoom_padding(1.0));
        assert!((zoom_padding(1.0) - 1.3).abs() < 1e-6);
        // Clamped at 0.1
        assert_eq!(zoom_padding(0.0), zoom_padding(0.1));
    }

    #[test]
    fn test_resize_updates_both_frusta() {
        let mut rig = CameraRig::new(100, 100);
        rig.resize(200, 100);
        assert!((rig.perspective.aspect - 2.0).abs() < 1e-6);
        assert!((rig.orthographic.right - 200.0).abs() < 1e-4);
        assert!((rig.orthographic.top - 100.0).abs() < 1e-4);
        // Idempotent
        rig.resize(200, 100);
        assert!((rig.orthographic.right - 200.0).abs() < 1e-4);
        // Zero height does not divide by zero
        rig.resize(50, 0);
        assert!(rig.perspective.aspect.is_finite());
    }

    #[test]
    fn test_set_view_preserves_distance() {
        let mut rig = CameraRig::new(800, 600);
        rig.fit_to_box(&unit_box(), 1.3);
        let d = rig.distance();
        rig.set_view(ViewPreset::Top);
        assert!((rig.distance() - d).abs() < 1e-3);
        assert!((rig.position - rig.orbit.target).normalize().abs_diff_eq(Vec3::Y, 1e-5));
        rig.set_view(ViewPreset::Iso);
        assert!((rig.distance() - d).abs() < 1e-3);
        // View matrix stays finite when looking straight down
        rig.set_view(ViewPreset::Top);
        assert!(rig.view_matrix().is_finite());
    }

    #[test]
    fn test_screen_ray_center_points_at_target() {
        let mut rig = CameraRig::new(800, 600);
        rig.fit_to_box(&unit_box(), 1.3);
        let ray = rig.screen_ray(0.0, 0.0);
        let to_target = (rig.orbit.target - rig.position).normalize();
        assert!(ray.direction.abs_diff_eq(to_target, 1e-4));

        rig.set_projection(Projection::Orthographic);
        let ray = rig.screen_ray(0.0, 0.0);
        assert!(ray.direction.abs_diff_eq(to_target, 1e-4));
    }

    #[test]
    fn test_orbit_damping_converges() {
        let mut rig = CameraRig::new(800, 600);
        rig.fit_to_box(&unit_box(), 1.3);
        let d = rig.distance();
        rig.orbit.rotate(0.5, 0.0);
        assert!(rig.update());
        let first = rig.position;
        for _ in 0..200 {
            rig.update();
        }
        // Distance preserved by pure rotation
        assert!((rig.distance() - d).abs() < 1e-2);
        assert_ne!(first, rig.position);
        // Eventually idle
        assert!(!rig.update());
    }

    #[test]
    fn test_orbit_dolly_ortho_changes_zoom() {
        let mut rig = CameraRig::new(800, 600);
        rig.set_projection(Projection::Orthographic);
        rig.orbit.dolly(0.5);
        rig.update();
        assert!((rig.orthographic.zoom - 2.0).abs() < 1e-5);
    }
}
