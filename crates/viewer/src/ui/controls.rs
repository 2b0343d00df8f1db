//! Side panel: model info, appearance, section, measurement and view controls

use egui::Ui;
use shared::{Projection, Units, ViewPreset};

use crate::app::AppState;

pub fn show(ui: &mut Ui, state: &mut AppState) {
    model_section(ui, state);
    ui.separator();
    appearance_section(ui, state);
    ui.separator();
    section_view(ui, state);
    ui.separator();
    measure_section(ui, state);
    ui.separator();
    view_section(ui, state);
}

fn model_section(ui: &mut Ui, state: &AppState) {
    ui.heading("Model");
    match state.viewer.model_dimensions() {
        Some(size) => {
            let units = state.viewer.units();
            let [x, y, z] = size.to_array().map(|v| units.from_mm(v as f64));
            ui.label(format!("{x:.2} × {y:.2} × {z:.2} {}", units.abbrev()));
        }
        None => {
            ui.weak("No model loaded");
        }
    }
}

fn appearance_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Appearance");
    let c = &mut state.controls;
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label("Color");
        changed |= ui.color_edit_button_srgb(&mut c.color).changed();
    });
    changed |= ui.checkbox(&mut c.wireframe, "Wireframe").changed();
    changed |= ui.checkbox(&mut c.xray, "X-ray").changed();
    if changed {
        state.apply_appearance();
    }
}

fn section_view(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Section");
    let c = &mut state.controls;
    let mut changed = ui.checkbox(&mut c.slice_enabled, "Slice").changed();
    ui.add_enabled_ui(c.slice_enabled, |ui| {
        changed |= ui
            .add(egui::Slider::new(&mut c.slice_level, 0.0..=1.0).text("Level"))
            .changed();
    });
    if changed {
        state.apply_clipping();
    }
}

fn measure_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Measure");
    let mut enabled = state.viewer.measure_mode();
    if ui.checkbox(&mut enabled, "Measure distance").changed() {
        state.viewer.set_measure_mode(enabled);
    }

    let mut units = state.viewer.units();
    egui::ComboBox::from_label("Units")
        .selected_text(units.abbrev())
        .show_ui(ui, |ui| {
            for u in Units::all() {
                ui.selectable_value(&mut units, *u, u.abbrev());
            }
        });
    if units != state.viewer.units() {
        state.viewer.set_units(units);
        state.settings.measurement.units = units;
        state.settings.save();
    }

    let mut scale = state.viewer.graphics_scale();
    if ui
        .add(egui::Slider::new(&mut scale, 0.1..=4.0).text("Overlay size"))
        .changed()
    {
        state.viewer.set_measurement_graphics_scale(scale);
    }

    if let Some(label) = state.viewer.measurement_label() {
        ui.monospace(label);
    }
}

fn view_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("View");
    ui.horizontal(|ui| {
        let mut projection = state.controls.projection;
        ui.radio_value(&mut projection, Projection::Perspective, "Perspective");
        ui.radio_value(&mut projection, Projection::Orthographic, "Ortho");
        if projection != state.controls.projection {
            state.controls.projection = projection;
            state.viewer.set_projection(projection);
        }
    });
    ui.horizontal_wrapped(|ui| {
        for preset in ViewPreset::all() {
            if ui.small_button(format!("{preset:?}")).clicked() {
                state.viewer.set_view(*preset);
            }
        }
    });
    if ui.button("Fit to screen").clicked() {
        state.viewer.fit_to_screen(1.0);
    }
}
