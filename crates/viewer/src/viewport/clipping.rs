//! Section-view clipping derived from the grounded model's vertical extent

use glam::Vec3;

use super::picking::Aabb;

/// Half-space `normal · p + constant >= 0` is kept, the rest is clipped away
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    pub fn distance_to_point(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.constant
    }

    pub fn keeps(&self, p: Vec3) -> bool {
        self.distance_to_point(p) >= 0.0
    }
}

/// Cached {min, max} world Y of the last loaded model
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelBounds {
    pub min: f32,
    pub max: f32,
}

impl ModelBounds {
    pub fn from_box(aabb: &Aabb) -> Self {
        if aabb.is_empty() {
            return Self::default();
        }
        Self {
            min: aabb.min.y,
            max: aabb.max.y,
        }
    }

    /// World Y of a normalized slice level
    pub fn level_height(&self, level: f32) -> f32 {
        self.min + level * (self.max - self.min)
    }
}

/// Slice state: an optional normalized level plus the bounds it refers to.
#[derive(Clone, Debug, Default)]
pub struct Clipping {
    level: Option<f32>,
    bounds: ModelBounds,
    planes: Vec<Plane>,
}

impl Clipping {
    pub fn level(&self) -> Option<f32> {
        self.level
    }

    pub fn bounds(&self) -> ModelBounds {
        self.bounds
    }

    /// Current plane list, shared by every model material
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// `None` disables clipping. Non-finite levels are treated as `None`.
    pub fn set_level(&mut self, level: Option<f32>) {
        self.level = level.filter(|l| l.is_finite()).map(|l| l.clamp(0.0, 1.0));
        self.recompute();
    }

    pub fn set_bounds(&mut self, bounds: ModelBounds) {
        self.bounds = bounds;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.planes = match self.level {
            Some(level) => {
                let y = self.bounds.level_height(level);
                vec![Plane::new(Vec3::NEG_Y, y)]
            }
            None => Vec::new(),
        };
        tracing::debug!(level = ?self.level, planes = self.planes.len(), "clipping updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_at_mid_level() {
        let mut c = Clipping::default();
        c.set_bounds(ModelBounds { min: 10.0, max: 50.0 });
        c.set_level(Some(0.5));
        let planes = c.planes();
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].normal, Vec3::NEG_Y);
        assert!((planes[0].constant - 30.0).abs() < 1e-6);
        // Below the cut is kept, above is removed
        assert!(planes[0].keeps(Vec3::new(0.0, 20.0, 0.0)));
        assert!(!planes[0].keeps(Vec3::new(0.0, 40.0, 0.0)));
    }

    #[test]
    fn test_disable_removes_planes() {
        let mut c = Clipping::default();
        c.set_bounds(ModelBounds { min: 0.0, max: 10.0 });
        c.set_level(Some(0.2));
        c.set_level(None);
        assert!(c.planes().is_empty());
        assert_eq!(c.level(), None);
    }

    #[test]
    fn test_bounds_change_recomputes() {
        let mut c = Clipping::default();
        c.set_level(Some(1.0));
        c.set_bounds(ModelBounds { min: 0.0, max: 8.0 });
        assert!((c.planes()[0].constant - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_level_is_clamped() {
        let mut c = Clipping::default();
        c.set_bounds(ModelBounds { min: 0.0, max: 10.0 });
        c.set_level(Some(3.0));
        assert_eq!(c.level(), Some(1.0));
        c.set_level(Some(f32::NAN));
        assert_eq!(c.level(), None);
    }
}
