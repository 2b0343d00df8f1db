//! Application menu bar

use eframe::egui;
use shared::{Projection, ViewPreset};

use super::AppState;

const MESH_EXTENSIONS: &[&str] = &["stl", "step", "stp", "iges", "igs", "brep"];

/// Show the file menu
pub fn file_menu(ui: &mut egui::Ui, state: &mut AppState) {
    ui.menu_button("File", |ui| {
        if ui.button("Open…").clicked() {
            ui.close_menu();
            if let Some(path) = rfd::FileDialog::new()
                .set_title("Open part")
                .add_filter("Parts", MESH_EXTENSIONS)
                .pick_file()
            {
                state.open_path(&path);
            }
        }
        if ui.button("Clear").clicked() {
            state.viewer.clear();
            state.status = "Model cleared".to_string();
            ui.close_menu();
        }
        ui.separator();
        if ui.button("Save snapshot…").clicked() {
            ui.close_menu();
            save_snapshot(state, false);
        }
        if ui.button("Save outline…").clicked() {
            ui.close_menu();
            save_snapshot(state, true);
        }
        ui.separator();
        if ui.button("Quit").clicked() {
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
        }
    });
}

/// Show the view menu
pub fn view_menu(ui: &mut egui::Ui, state: &mut AppState) {
    ui.menu_button("View", |ui| {
        for preset in ViewPreset::all() {
            if ui.button(preset_label(*preset)).clicked() {
                state.viewer.set_view(*preset);
                ui.close_menu();
            }
        }
        ui.separator();
        if ui.button("Fit to screen").clicked() {
            state.viewer.fit_to_screen(1.0);
            ui.close_menu();
        }
        let mut ortho = state.controls.projection == Projection::Orthographic;
        if ui.checkbox(&mut ortho, "Orthographic").changed() {
            state.controls.projection = if ortho {
                Projection::Orthographic
            } else {
                Projection::Perspective
            };
            state.viewer.set_projection(state.controls.projection);
        }
        ui.separator();
        let grid = ui.checkbox(&mut state.settings.viewport.show_grid, "Grid").changed();
        let axes = ui.checkbox(&mut state.settings.viewport.show_axes, "Axes").changed();
        if grid || axes {
            state.viewer.set_helpers_visible(state.settings.viewport.show_grid, state.settings.viewport.show_axes);
            state.settings.save();
        }
        if ui.checkbox(&mut state.settings.viewport.show_view_cube, "View cube").changed() {
            state.viewer.set_show_view_cube(state.settings.viewport.show_view_cube);
            state.settings.save();
        }
    });
}

pub fn preset_label(preset: ViewPreset) -> &'static str {
    match preset {
        ViewPreset::Top => "Top",
        ViewPreset::Bottom => "Bottom",
        ViewPreset::Front => "Front",
        ViewPreset::Back => "Back",
        ViewPreset::Right => "Right",
        ViewPreset::Left => "Left",
        ViewPreset::Iso => "Isometric",
    }
}

fn save_snapshot(state: &mut AppState, outline: bool) {
    let Some(path) = rfd::FileDialog::new()
        .set_title(if outline { "Save outline" } else { "Save snapshot" })
        .add_filter("PNG", &["png"])
        .set_file_name(if outline { "outline.png" } else { "snapshot.png" })
        .save_file()
    else {
        return;
    };
    let snapshot = if outline {
        state.viewer.outline_snapshot()
    } else {
        state.viewer.screenshot()
    };
    state.status = match snapshot {
        Ok(snap) => match snap.save(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), outline, "snapshot saved");
                format!("Saved {}", path.display())
            }
            Err(e) => {
                tracing::error!("Failed to write snapshot: {e}");
                format!("Failed to write snapshot: {e}")
            }
        },
        Err(e) => {
            tracing::error!("Snapshot failed: {e}");
            format!("Snapshot failed: {e}")
        }
    };
}
