//! Application style configuration

use eframe::egui;

const FONT_SIZE: f32 = 14.0;

/// Light theme with compact spacing around the viewport
pub fn configure_styles(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    style.visuals = egui::Visuals::light();
    style.visuals.window_corner_radius = egui::CornerRadius::same(6);
    style.visuals.menu_corner_radius = egui::CornerRadius::same(4);
    style.visuals.panel_fill = egui::Color32::from_rgb(246, 247, 250);
    style.visuals.selection.bg_fill = egui::Color32::from_rgb(59, 130, 246);

    style.spacing.item_spacing = egui::vec2(6.0, 5.0);
    style.spacing.button_padding = egui::vec2(6.0, 3.0);
    style.spacing.slider_width = 150.0;

    for (text_style, scale) in [
        (egui::TextStyle::Body, 1.0),
        (egui::TextStyle::Button, 1.0),
        (egui::TextStyle::Small, 0.85),
        (egui::TextStyle::Heading, 1.2),
    ] {
        style
            .text_styles
            .insert(text_style, egui::FontId::proportional(FONT_SIZE * scale));
    }
    style
        .text_styles
        .insert(egui::TextStyle::Monospace, egui::FontId::monospace(FONT_SIZE));

    ctx.set_style(style);
}
