//! Model color, wireframe and x-ray state

use super::clipping::Plane;
use super::mesh::hex_to_rgb;
use super::renderer::Material;

/// Default model color (light periwinkle)
pub const DEFAULT_MODEL_COLOR: u32 = 0xb8c2ff;
pub const XRAY_OPACITY: f32 = 0.3;
/// Background multiplier while wireframe or x-ray is on
pub const BACKGROUND_DARKEN: f32 = 0.85;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Appearance {
    /// 0xRRGGBB
    pub color: u32,
    pub wireframe: bool,
    pub xray: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            color: DEFAULT_MODEL_COLOR,
            wireframe: false,
            xray: false,
        }
    }
}

impl Appearance {
    /// Write color, wireframe and x-ray state into a model material
    pub fn apply(&self, material: &mut Material) {
        material.color = hex_to_rgb(self.color);
        material.wireframe = self.wireframe;
        material.double_sided = true;
        if self.xray {
            material.transparent = true;
            material.opacity = XRAY_OPACITY;
            material.depth_write = false;
        } else {
            material.transparent = false;
            material.opacity = 1.0;
            material.depth_write = true;
        }
    }

    /// Material for the loaded model under this appearance and the given clip planes
    pub fn model_material(&self, planes: &[Plane]) -> Material {
        let mut material = Material::standard(hex_to_rgb(self.color));
        self.apply(&mut material);
        material.clipping_planes = planes.to_vec();
        material
    }

    /// Scene background over `base`; `None` leaves the plain clear color
    pub fn background(&self, base: [f32; 3]) -> Option<[f32; 3]> {
        if self.wireframe || self.xray {
            Some(base.map(|c| c * BACKGROUND_DARKEN))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_xray_material_state() {
        let a = Appearance {
            color: 0xff0000,
            wireframe: false,
            xray: true,
        };
        let m = a.model_material(&[]);
        assert!(m.transparent);
        assert_eq!(m.opacity, XRAY_OPACITY);
        assert!(!m.depth_write);
        assert!(m.double_sided);
        assert_eq!(m.color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_toggle_back_restores_opaque() {
        let mut m = Appearance {
            xray: true,
            ..Default::default()
        }
        .model_material(&[]);
        Appearance::default().apply(&mut m);
        assert!(!m.transparent);
        assert_eq!(m.opacity, 1.0);
        assert!(m.depth_write);
    }

    #[test]
    fn test_planes_are_copied_into_material() {
        let planes = [Plane::new(Vec3::NEG_Y, 4.0)];
        let m = Appearance::default().model_material(&planes);
        assert_eq!(m.clipping_planes, planes.to_vec());
    }

    #[test]
    fn test_background_darkens_for_wireframe_or_xray() {
        let base = [1.0, 1.0, 1.0];
        assert_eq!(Appearance::default().background(base), None);
        let wf = Appearance {
            wireframe: true,
            ..Default::default()
        };
        let bg = wf.background(base).unwrap();
        assert!(bg[0] < 1.0);
    }
}
