use egui::Ui;

use crate::app::AppState;

pub fn show(ui: &mut Ui, state: &AppState) {
    ui.horizontal(|ui| {
        if state.viewer.is_loading() {
            ui.spinner();
        }
        ui.weak(&state.status);

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if state.viewer.measure_mode() {
                let hint = match state.viewer.measurement_session().len() {
                    1 => "Pick the second point",
                    _ => "Pick the first point",
                };
                ui.weak(hint);
                ui.separator();
            }
            if let Some(label) = state.viewer.measurement_label() {
                ui.monospace(label);
            }
        });
    });
}
