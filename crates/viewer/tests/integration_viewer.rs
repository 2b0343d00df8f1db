//! Integration tests for the viewer facade: loading, framing, clipping,
//! appearance, highlight and teardown.

use glam::Vec3;
use part_viewer_lib::error::{DecodeError, ViewerError};
use part_viewer_lib::fixtures;
use part_viewer_lib::harness::ViewerHarness;
use shared::{Projection, RawMesh, ViewPreset};

#[test]
fn test_fit_to_screen_larger_zoom_is_closer() {
    let mut h = ViewerHarness::new();
    h.load_box(40.0, 25.0, 60.0).unwrap();

    let mut last = f32::INFINITY;
    for zoom in [0.1, 0.5, 1.0, 2.0, 4.0] {
        h.fit_to_screen(zoom);
        let d = h.camera().distance();
        assert!(d < last, "zoom {zoom}: {d} !< {last}");
        last = d;
    }
}

#[test]
fn test_fit_to_screen_without_model_is_noop() {
    let mut h = ViewerHarness::new();
    let before = h.camera().position;
    h.fit_to_screen(2.0);
    assert_eq!(h.camera().position, before);
}

#[test]
fn test_loaded_model_rests_on_ground() {
    let mut h = ViewerHarness::new();
    for raw in [
        fixtures::box_between([3.0, -37.0, 1.0], [10.0, 5.0, 9.0]),
        fixtures::box_between([0.0, 120.0, 0.0], [1.0, 121.5, 2.0]),
        fixtures::tetrahedron(12.0),
    ] {
        h.load_mesh(&raw).unwrap();
        let bounds = h.model_world_bounds().unwrap();
        assert!(bounds.min.y.abs() < 1e-4, "min y = {}", bounds.min.y);
        // Recentered horizontally
        assert!(bounds.center().x.abs() < 1e-4);
        assert!(bounds.center().z.abs() < 1e-4);
        assert_eq!(h.model_bounds().min, bounds.min.y);
        assert_eq!(h.model_bounds().max, bounds.max.y);
    }
}

#[test]
fn test_load_frames_model_and_replaces_previous() {
    let mut h = ViewerHarness::new();
    h.load_box(10.0, 20.0, 30.0).unwrap();
    let live = h.live_resources();
    assert!(h.camera().orbit.target.abs_diff_eq(Vec3::new(0.0, 10.0, 0.0), 1e-4));

    h.load_box(100.0, 100.0, 100.0).unwrap();
    assert_eq!(h.live_resources(), live);
    let dims = h.model_dimensions().unwrap();
    assert!(dims.abs_diff_eq(Vec3::splat(100.0), 1e-3));
}

#[test]
fn test_decode_error_leaves_model_untouched() {
    let mut h = ViewerHarness::new();
    h.load_box(10.0, 20.0, 30.0).unwrap();
    let dims = h.model_dimensions();
    let camera = h.camera().position;

    let err = h.load_mesh(&RawMesh::default()).unwrap_err();
    assert!(matches!(err, ViewerError::Decode(DecodeError::Empty)));
    let err = h
        .load_mesh(&RawMesh::from_positions(vec![[0.0, 0.0, 0.0]; 3]))
        .unwrap_err();
    assert!(matches!(err, ViewerError::Decode(DecodeError::Degenerate)));

    assert_eq!(h.model_dimensions(), dims);
    assert_eq!(h.camera().position, camera);
}

#[test]
fn test_resize_without_model() {
    let mut h = ViewerHarness::new();
    h.resize(640, 480);
    assert!((h.camera().aspect() - 4.0 / 3.0).abs() < 1e-6);
    assert!((h.camera().perspective.aspect - 4.0 / 3.0).abs() < 1e-6);
    assert_eq!(h.frame().dimensions(), (640, 480));

    // Idempotent, and a zero-sized host does not panic
    h.resize(640, 480);
    h.resize(0, 0);
    h.run(2);
}

#[test]
fn test_set_view_keeps_distance_and_projection_switch() {
    let mut h = ViewerHarness::new();
    h.load_box(50.0, 50.0, 50.0).unwrap();
    let d = h.camera().distance();
    let target = h.camera().orbit.target;

    for preset in ViewPreset::all() {
        h.set_view(*preset);
        assert!((h.camera().distance() - d).abs() < 1e-3);
        let dir = (h.camera().position - target).normalize();
        assert!(dir.abs_diff_eq(Vec3::from(preset.direction()).normalize(), 1e-5));
        h.run(1);
    }

    h.set_projection(Projection::Orthographic);
    assert_eq!(h.camera().active, Projection::Orthographic);
    // Picking works through the orthographic camera
    h.set_view(ViewPreset::Front);
    let hit = h.pick_at_screen_position(0.1, 0.05).unwrap();
    assert!((hit.z - 25.0).abs() < 1e-3);
}

#[test]
fn test_orbit_damping_settles() {
    let mut h = ViewerHarness::new();
    h.load_box(50.0, 50.0, 50.0).unwrap();
    let start = h.camera().position;
    let d = h.camera().distance();

    h.orbit_mut().rotate(0.5, 0.0);
    h.run(200);
    let settled = h.camera().position;
    assert!(!settled.abs_diff_eq(start, 1e-2));
    assert!((h.camera().distance() - d).abs() < 1e-2);

    h.run(5);
    assert!(h.camera().position.abs_diff_eq(settled, 1e-3));
}

#[test]
fn test_pick_misses_empty_space_and_hits_model() {
    let mut h = ViewerHarness::new();
    assert_eq!(h.pick_at_screen_position(0.0, 0.0), None);

    // Not a cube: the center ray must not run along an edge
    h.load_box(50.0, 50.0, 30.0).unwrap();
    let hit = h.pick_at_screen_position(0.0, 0.0).unwrap();
    // Surface point of the box
    let b = h.model_world_bounds().unwrap();
    let on_face = [hit.x - b.max.x, hit.y - b.max.y, hit.z - b.max.z]
        .iter()
        .any(|d| d.abs() < 1e-3);
    assert!(on_face, "hit {hit:?} not on a visible face");
    assert_eq!(h.pick_at_screen_position(0.99, 0.99), None);
}

#[test]
fn test_clipping_plane_tracks_level_and_bounds() {
    let mut h = ViewerHarness::new();
    h.load_box(10.0, 40.0, 10.0).unwrap();

    h.set_clipping(Some(0.5));
    let planes = h.clipping_planes().to_vec();
    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].normal, Vec3::NEG_Y);
    assert!((planes[0].constant - 20.0).abs() < 1e-4);
    assert_eq!(h.model_material().unwrap().clipping_planes, planes);

    // A new load recomputes the plane for the new bounds
    h.load_box(10.0, 80.0, 10.0).unwrap();
    assert!((h.clipping_planes()[0].constant - 40.0).abs() < 1e-4);

    h.set_clipping(None);
    assert!(h.clipping_planes().is_empty());
    assert!(h.model_material().unwrap().clipping_planes.is_empty());
}

#[test]
fn test_clipping_hides_geometry_above_plane() {
    let mut h = ViewerHarness::with_size(96, 96);
    h.set_helpers_visible(false, false);
    h.load_box(40.0, 40.0, 40.0).unwrap();
    h.set_material_properties(0x336699, false, false);
    h.set_view(ViewPreset::Front);
    h.run(1);

    // Upper part of the screen shows the box, then only background once sliced low
    let sample = (48, 30);
    assert_ne!(h.frame().get_pixel(sample.0, sample.1).0, [255, 255, 255, 255]);
    h.set_clipping(Some(0.1));
    assert_eq!(h.frame().get_pixel(sample.0, sample.1).0, [255, 255, 255, 255]);
}

#[test]
fn test_xray_and_wireframe_material_state() {
    let mut h = ViewerHarness::new();
    h.load_box(10.0, 10.0, 10.0).unwrap();

    h.set_material_properties(0x336699, false, true);
    let m = h.model_material().unwrap();
    assert!(m.transparent && !m.depth_write && m.double_sided);
    assert!((m.opacity - 0.3).abs() < 1e-6);

    h.set_material_properties(0x336699, true, false);
    let m = h.model_material().unwrap();
    assert!(m.wireframe && !m.transparent && m.depth_write);
    assert_eq!(m.opacity, 1.0);
}

#[test]
fn test_background_darkens_with_wireframe_or_xray() {
    let mut h = ViewerHarness::with_size(32, 32);
    h.set_helpers_visible(false, false);
    assert_eq!(h.frame().get_pixel(0, 0).0, [255, 255, 255, 255]);

    h.set_material_properties(0xb8c2ff, true, false);
    assert_eq!(h.frame().get_pixel(0, 0).0, [217, 217, 217, 255]);

    h.set_material_properties(0xb8c2ff, false, false);
    h.set_background_color(0x202020);
    assert_eq!(h.frame().get_pixel(0, 0).0, [32, 32, 32, 255]);
}

fn distance_sq(px: [u8; 4], rgb: [u8; 3]) -> i32 {
    (0..3).map(|i| (px[i] as i32 - rgb[i] as i32).pow(2)).sum()
}

#[test]
fn test_highlight_tints_model_pixels() {
    let mut h = ViewerHarness::new();
    h.load_box(40.0, 40.0, 40.0).unwrap();
    h.set_view(ViewPreset::Front);
    let (cx, cy) = (160, 120);
    let before = h.frame().get_pixel(cx, cy).0;

    let all: Vec<usize> = (0..12).collect();
    h.set_highlight(Some(&all), None);
    let after = h.frame().get_pixel(cx, cy).0;

    assert_ne!(before, after);
    let blue = [0x3b, 0x82, 0xf6];
    assert!(distance_sq(after, blue) < distance_sq(before, blue));
    assert!(after[2] as i32 - after[0] as i32 > before[2] as i32 - before[0] as i32);

    h.set_highlight(None, None);
    assert_eq!(h.frame().get_pixel(cx, cy).0, before);
}

#[test]
fn test_highlight_and_focus_animation() {
    let mut h = ViewerHarness::new();
    h.load_box(20.0, 20.0, 20.0).unwrap();
    h.set_view(ViewPreset::Front);
    let plain = h.frame().get_pixel(160, 120).0;
    let base = h.live_resources();
    let focus = Vec3::new(10.0, 5.0, 0.0);

    h.set_highlight(Some(&[10, 11, 999]), Some(focus));
    assert!(h.highlight_active());
    assert_eq!(h.live_resources(), base + 1);
    assert!(h.is_focusing());
    let tinted = h.frame().get_pixel(160, 120).0;
    assert!(distance_sq(tinted, [0x3b, 0x82, 0xf6]) < distance_sq(plain, [0x3b, 0x82, 0xf6]));

    // One second at 60 fps plus slack
    h.run(70);
    assert!(!h.is_focusing());
    assert!(h.camera().orbit.target.abs_diff_eq(focus, 1e-3));

    h.set_highlight(Some(&[]), None);
    assert!(!h.highlight_active());
    assert_eq!(h.live_resources(), base);
}

#[test]
fn test_clear_keeps_bounds_and_releases_model() {
    let mut h = ViewerHarness::new();
    let helpers = h.live_resources();
    h.load_box(10.0, 30.0, 10.0).unwrap();
    h.set_highlight(Some(&[0]), None);
    h.clear();

    assert_eq!(h.model_dimensions(), None);
    assert!(!h.highlight_active());
    assert_eq!(h.live_resources(), helpers);
    assert_eq!(h.model_bounds().max, 30.0);
}

#[test]
fn test_dispose_releases_everything_once() {
    let mut h = ViewerHarness::new();
    h.load_box(10.0, 10.0, 10.0).unwrap();
    h.set_measure_mode(true);
    h.set_measurement_segment(Some(Vec3::ZERO), Some(Vec3::X * 5.0), Some("5.00 mm"));
    h.set_highlight(Some(&[0, 1]), None);
    assert!(h.live_resources() > 0);

    assert!(h.dispose());
    assert_eq!(h.live_resources(), 0);
    assert!(!h.dispose());

    assert!(matches!(h.load_box(1.0, 1.0, 1.0), Err(ViewerError::Disposed)));
    assert!(h.step().is_none());
    assert_eq!(h.pick_at_screen_position(0.0, 0.0), None);
    h.set_measurement_segment(Some(Vec3::ZERO), Some(Vec3::X), None);
    assert_eq!(h.live_resources(), 0);
}
