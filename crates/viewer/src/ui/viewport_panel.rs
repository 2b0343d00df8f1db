//! Central viewport: pointer input, frame tick and the GL paint callback

use std::f32::consts::TAU;

use egui::{PointerButton, Rect, Sense, Ui};
use glam::{Vec2, Vec3};
use part_viewer_lib::viewport::measure::MeasureOutcome;
use shared::Projection;

use crate::app::AppState;

/// Scroll points per e-fold of dolly
const SCROLL_SENSITIVITY: f32 = 0.002;

pub fn show(ui: &mut Ui, state: &mut AppState, now: f64) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
    let width = rect.width().max(1.0) as u32;
    let height = rect.height().max(1.0) as u32;
    if state.viewer.camera().viewport() != [width, height] {
        state.viewer.resize(width, height);
    }

    // Pointer position in viewport pixels, origin top-left
    let local = |pos: egui::Pos2| Vec2::new(pos.x - rect.left(), pos.y - rect.top());
    let over_cube = state.viewer.view_cube_hover(response.hover_pos().map(local));

    if over_cube {
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                state.viewer.view_cube_click(local(pos));
            }
        }
    } else {
        handle_orbit(ui, state, &response, rect);
    }

    if response.clicked() && !over_cube && state.viewer.measure_mode() {
        if let Some(pos) = response.interact_pointer_pos() {
            let ndc_x = (pos.x - rect.left()) / rect.width() * 2.0 - 1.0;
            let ndc_y = 1.0 - (pos.y - rect.top()) / rect.height() * 2.0;
            match state.viewer.click(ndc_x, ndc_y) {
                MeasureOutcome::Completed { distance_mm, .. } => {
                    tracing::info!(distance_mm, "measured");
                }
                MeasureOutcome::Missed => state.status = "No surface under cursor".to_string(),
                MeasureOutcome::FirstPoint(_) | MeasureOutcome::Inactive => {}
            }
        }
    }

    if let Some(result) = state.viewer.tick(now) {
        state.finish_load(result);
    }

    ui.painter().add(state.viewer.backend().paint_callback(rect));
}

fn handle_orbit(ui: &Ui, state: &mut AppState, response: &egui::Response, rect: Rect) {
    let h = rect.height().max(1.0);
    let delta = response.drag_delta();

    if response.dragged_by(PointerButton::Primary) {
        state
            .viewer
            .orbit_mut()
            .rotate(TAU * delta.x / h, TAU * delta.y / h);
    } else if response.dragged_by(PointerButton::Secondary) || response.dragged_by(PointerButton::Middle) {
        let camera = state.viewer.camera();
        let (right, up) = camera.screen_basis();
        let world_per_px = match camera.active {
            Projection::Perspective => {
                2.0 * camera.distance() * (camera.perspective.fov_deg.to_radians() * 0.5).tan() / h
            }
            Projection::Orthographic => {
                camera.orthographic.height() / camera.orthographic.zoom / h
            }
        };
        let offset: Vec3 = (-right * delta.x + up * delta.y) * world_per_px;
        state.viewer.orbit_mut().pan(offset);
    }

    if response.hovered() {
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll != 0.0 {
            state
                .viewer
                .orbit_mut()
                .dolly((-scroll * SCROLL_SENSITIVITY).exp());
        }
    }
}
