//! Integration tests for picking-driven measurement and its overlay.

use glam::Vec3;
use part_viewer_lib::harness::ViewerHarness;
use part_viewer_lib::viewport::measure::{MeasureOutcome, MeasureSession};
use shared::Units;

/// 100 mm cube resting on the ground; its +Z face faces the default camera
fn cube_viewer() -> ViewerHarness {
    let mut h = ViewerHarness::new();
    h.load_box(100.0, 100.0, 100.0).unwrap();
    h.set_measure_mode(true);
    h
}

// Points on the +Z face, away from the face diagonal
const P1: Vec3 = Vec3::new(-10.0, 60.0, 50.0);
const P2: Vec3 = Vec3::new(-7.0, 64.0, 50.0);
const P3: Vec3 = Vec3::new(20.0, 30.0, 50.0);

#[test]
fn test_three_four_five_measurement() {
    let mut h = cube_viewer();

    match h.click_world(P1) {
        MeasureOutcome::FirstPoint(p) => assert!(p.abs_diff_eq(P1, 1e-2)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.overlay_entity_count(), 0);

    let MeasureOutcome::Completed { distance_mm, .. } = h.click_world(P2) else {
        panic!("second pick did not complete");
    };
    assert!((distance_mm - 5.0).abs() < 1e-2);
    assert_eq!(h.measurement_label().as_deref(), Some("5.00 mm"));
    // Segment, two arrows, label
    assert_eq!(h.overlay_entity_count(), 4);

    h.set_units(Units::Inches);
    assert_eq!(h.measurement_label().as_deref(), Some("0.20 in"));
    assert!((h.measurement_mm().unwrap() - distance_mm).abs() < 1e-12);
    assert_eq!(h.overlay_entity_count(), 4);
}

#[test]
fn test_third_pick_restarts_session() {
    let mut h = cube_viewer();
    h.click_world(P1);
    h.click_world(P2);
    assert_eq!(h.overlay_entity_count(), 4);
    let live = h.live_resources();

    assert!(matches!(h.click_world(P3), MeasureOutcome::FirstPoint(_)));
    assert_eq!(h.measurement_session().len(), 1);
    assert_eq!(h.overlay_entity_count(), 0);
    assert_eq!(h.live_resources(), live - 4);

    assert!(matches!(h.click_world(P1), MeasureOutcome::Completed { .. }));
    assert_eq!(h.overlay_entity_count(), 4);
    assert_eq!(h.live_resources(), live);
}

#[test]
fn test_missed_click_keeps_session() {
    let mut h = cube_viewer();
    h.click_world(P1);
    assert_eq!(h.click(0.99, 0.99), MeasureOutcome::Missed);
    assert_eq!(h.measurement_session().len(), 1);
}

#[test]
fn test_measure_mode_off_clears_everything() {
    let mut h = cube_viewer();
    h.click_world(P1);
    h.click_world(P3);
    assert_eq!(h.overlay_entity_count(), 4);

    h.set_measure_mode(false);
    assert_eq!(h.overlay_entity_count(), 0);
    assert_eq!(*h.measurement_session(), MeasureSession::Empty);
    assert_eq!(h.click_world(P1), MeasureOutcome::Inactive);
}

#[test]
fn test_new_load_resets_measurement() {
    let mut h = cube_viewer();
    h.click_world(P1);
    h.click_world(P3);
    h.load_box(10.0, 10.0, 10.0).unwrap();
    assert_eq!(h.overlay_entity_count(), 0);
    assert!(h.measurement_session().is_empty());
    // Mode stays on
    assert!(h.measure_mode());
}

#[test]
fn test_external_segment_and_degenerate_case() {
    let mut h = ViewerHarness::new();
    h.set_measurement_segment(Some(Vec3::ZERO), Some(Vec3::new(0.0, 0.0, 12.0)), Some("12.00 mm"));
    assert_eq!(h.overlay_entity_count(), 4);

    h.set_measurement_segment(Some(Vec3::ZERO), Some(Vec3::new(0.0, 0.0, 12.0)), None);
    assert_eq!(h.overlay_entity_count(), 3);

    h.set_measurement_segment(Some(Vec3::ONE), Some(Vec3::ONE), Some("0.00 mm"));
    assert_eq!(h.overlay_entity_count(), 0);

    h.set_measurement_segment(Some(Vec3::ONE), None, None);
    assert_eq!(h.overlay_entity_count(), 0);
}

#[test]
fn test_graphics_scale_clamps_and_rebuilds() {
    let mut h = ViewerHarness::new();
    assert!((h.graphics_scale() - 0.6).abs() < 1e-6);
    h.set_measurement_segment(Some(Vec3::ZERO), Some(Vec3::X * 50.0), Some("50.00 mm"));
    let live = h.live_resources();

    h.set_measurement_graphics_scale(10.0);
    assert_eq!(h.graphics_scale(), 4.0);
    assert_eq!(h.overlay_entity_count(), 4);
    assert_eq!(h.live_resources(), live);

    h.set_measurement_graphics_scale(0.0);
    assert_eq!(h.graphics_scale(), 0.1);
}

#[test]
fn test_overlay_drawn_over_model() {
    let mut h = cube_viewer();
    h.set_helpers_visible(false, false);
    h.click_world(Vec3::new(-40.0, 30.0, 50.0));
    h.click_world(Vec3::new(40.0, 75.0, 50.0));

    // Midpoint of the segment is covered by black overlay pixels or the label
    let mid = h.ndc_of(Vec3::new(0.0, 52.5, 50.0)).unwrap();
    let frame = h.frame();
    let x = ((mid.x + 1.0) * 0.5 * frame.width() as f32) as i64;
    let y = ((1.0 - mid.y) * 0.5 * frame.height() as f32) as i64;
    let dark = (-3..=3).any(|dy: i64| {
        (-3..=3).any(|dx: i64| {
            let (px, py) = ((x + dx) as u32, (y + dy) as u32);
            frame.get_pixel(px, py).0[..3].iter().all(|&c| c < 40)
        })
    });
    assert!(dark, "no overlay pixels near the segment midpoint");
}
