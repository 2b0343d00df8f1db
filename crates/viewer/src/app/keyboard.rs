//! Keyboard shortcut handling

use eframe::egui;
use shared::{Projection, ViewPreset};

use super::AppState;

const PRESET_KEYS: [egui::Key; 7] = [
    egui::Key::Num1,
    egui::Key::Num2,
    egui::Key::Num3,
    egui::Key::Num4,
    egui::Key::Num5,
    egui::Key::Num6,
    egui::Key::Num7,
];

/// Handle keyboard shortcuts for the viewer
pub fn handle_keyboard(ctx: &egui::Context, state: &mut AppState) {
    // Don't handle shortcuts when a text field is focused
    if ctx.memory(|m| m.focused().is_some()) {
        return;
    }

    ctx.input(|i| {
        // M: toggle measure mode
        if i.key_pressed(egui::Key::M) {
            let on = !state.viewer.measure_mode();
            state.viewer.set_measure_mode(on);
        }
        // Escape: drop the current measurement
        if i.key_pressed(egui::Key::Escape) && state.viewer.measure_mode() {
            state.viewer.set_measure_mode(false);
            state.viewer.set_measure_mode(true);
        }
        // F: fit model
        if i.key_pressed(egui::Key::F) {
            state.viewer.fit_to_screen(1.0);
        }
        // O: toggle orthographic
        if i.key_pressed(egui::Key::O) {
            state.controls.projection = match state.controls.projection {
                Projection::Perspective => Projection::Orthographic,
                Projection::Orthographic => Projection::Perspective,
            };
            state.viewer.set_projection(state.controls.projection);
        }
        // 1..7: view presets
        for (key, preset) in PRESET_KEYS.iter().zip(ViewPreset::all()) {
            if i.key_pressed(*key) {
                state.viewer.set_view(*preset);
            }
        }
    });
}
