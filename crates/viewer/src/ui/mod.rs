pub mod controls;
pub mod status_bar;
pub mod viewport_panel;
