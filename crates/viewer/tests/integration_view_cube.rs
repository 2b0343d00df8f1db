//! Integration tests for the orientation cube: visibility, camera sync,
//! hover highlight and click navigation.

use glam::{Vec2, Vec3};
use part_viewer_lib::harness::ViewerHarness;
use part_viewer_lib::settings::ViewerSettings;
use part_viewer_lib::viewport::view_cube::{CubeFace, CubeTarget};
use shared::ViewPreset;

/// Center of the cube inset in a 320×240 viewport
const CUBE_CENTER: Vec2 = Vec2::new(238.0, 158.0);
/// On the front face above its caption when the camera looks along -Z
const FRONT_FACE_PLAIN: (u32, u32) = (238, 140);
/// Near the top edge of the front face
const FRONT_TOP_EDGE: Vec2 = Vec2::new(238.0, 133.0);

fn front_viewer() -> ViewerHarness {
    let mut h = ViewerHarness::new();
    h.load_box(40.0, 40.0, 40.0).unwrap();
    h.set_view(ViewPreset::Front);
    h.step();
    h
}

fn view_direction(h: &ViewerHarness) -> Vec3 {
    (h.camera().position - h.camera().orbit.target).normalize()
}

#[test]
fn test_toggle_hides_cube_pixels() {
    let mut h = front_viewer();
    assert!(h.show_view_cube());
    let shown = h.frame();

    h.set_show_view_cube(false);
    assert!(!h.show_view_cube());
    let hidden = h.frame();

    let (x, y) = FRONT_FACE_PLAIN;
    assert_ne!(shown.get_pixel(x, y), hidden.get_pixel(x, y));
    // Outside the inset nothing changes
    assert_eq!(shown.get_pixel(20, 20), hidden.get_pixel(20, 20));
    assert!(!h.view_cube_hover(Some(CUBE_CENTER)));
    assert_eq!(h.view_cube_click(CUBE_CENTER), None);
}

#[test]
fn test_setting_disables_cube() {
    let mut settings = ViewerSettings::default();
    settings.viewport.show_view_cube = false;
    let h = ViewerHarness::with_settings(320, 240, &settings);
    assert!(!h.show_view_cube());
    assert!(!h.scene_state().view_cube_visible);
}

#[test]
fn test_rotation_follows_camera_each_tick() {
    let mut h = front_viewer();
    assert!((h.view_cube_rotation() * Vec3::Z).abs_diff_eq(Vec3::Z, 1e-4));

    h.set_view(ViewPreset::Top);
    h.step();
    assert!((h.view_cube_rotation() * Vec3::Y).abs_diff_eq(Vec3::Z, 1e-4));

    h.set_view(ViewPreset::Right);
    h.step();
    assert!((h.view_cube_rotation() * Vec3::X).abs_diff_eq(Vec3::Z, 1e-4));
}

#[test]
fn test_hover_tints_face() {
    let mut h = front_viewer();
    let (x, y) = FRONT_FACE_PLAIN;
    let plain = *h.frame().get_pixel(x, y);

    assert!(h.view_cube_hover(Some(Vec2::new(x as f32, y as f32))));
    assert_eq!(h.view_cube_hovered(), &[CubeFace::PosZ]);
    let hovered = *h.frame().get_pixel(x, y);
    assert!(hovered.0[0] < plain.0[0], "{hovered:?} vs {plain:?}");

    assert!(!h.view_cube_hover(None));
    assert!(h.view_cube_hovered().is_empty());
    assert_eq!(*h.frame().get_pixel(x, y), plain);
}

#[test]
fn test_face_click_selects_preset() {
    let mut h = front_viewer();
    h.set_view(ViewPreset::Top);
    h.step();

    assert_eq!(h.view_cube_click(CUBE_CENTER), Some(CubeTarget::Face(CubeFace::PosY)));
    assert!(view_direction(&h).abs_diff_eq(Vec3::Y, 1e-4));

    h.set_view(ViewPreset::Left);
    h.step();
    assert_eq!(h.view_cube_click(CUBE_CENTER), Some(CubeTarget::Face(CubeFace::NegX)));
    assert!(view_direction(&h).abs_diff_eq(Vec3::NEG_X, 1e-4));
}

#[test]
fn test_edge_click_snaps_to_diagonal() {
    let mut h = front_viewer();
    let distance = h.camera().distance();

    let target = h.view_cube_click(FRONT_TOP_EDGE);
    let expected = Vec3::new(0.0, 1.0, 1.0).normalize();
    assert_eq!(
        target,
        Some(CubeTarget::Diagonal {
            faces: vec![CubeFace::PosY, CubeFace::PosZ],
            direction: expected,
        })
    );
    assert!(h.is_snapping());

    h.run(30);
    assert!(!h.is_snapping());
    assert!(view_direction(&h).abs_diff_eq(expected, 1e-3));
    assert!(h.camera().distance() >= distance - 1e-3);
    assert_eq!(h.camera().up, Vec3::Y);
}

#[test]
fn test_set_view_cancels_snap() {
    let mut h = front_viewer();
    h.view_cube_click(FRONT_TOP_EDGE);
    h.step();
    h.set_view(ViewPreset::Right);
    assert!(!h.is_snapping());
    h.run(30);
    assert!(view_direction(&h).abs_diff_eq(Vec3::X, 1e-4));
}

#[test]
fn test_click_outside_cube_is_ignored() {
    let mut h = front_viewer();
    let before = h.camera().position;
    assert_eq!(h.view_cube_click(Vec2::new(20.0, 20.0)), None);
    // Inset corner, outside the cube silhouette
    assert_eq!(h.view_cube_click(Vec2::new(170.0, 90.0)), None);
    assert_eq!(h.camera().position, before);
}

#[test]
fn test_captures_hide_cube_and_restore_it() {
    let mut h = ViewerHarness::new();
    let (x, y) = FRONT_FACE_PLAIN;
    assert_ne!(h.frame().get_pixel(x, y).0, [255, 255, 255, 255]);

    let shot = h.screenshot().unwrap();
    assert!(shot.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    assert!(h.scene_state().view_cube_visible);
    assert_ne!(h.frame().get_pixel(x, y).0, [255, 255, 255, 255]);
}
