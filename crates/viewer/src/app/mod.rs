//! Main application module

mod keyboard;
mod menus;
mod styles;

use std::path::Path;
use std::time::Instant;

use eframe::egui;
use part_viewer_lib::error::ViewerError;
use part_viewer_lib::loader::{self, ConversionWorker, StlConverter};
use part_viewer_lib::settings::ViewerSettings;
use part_viewer_lib::viewport::gl_backend::GlBackend;
use part_viewer_lib::viewport::Viewer;
use shared::Projection;

use crate::ui::{controls, status_bar, viewport_panel};

/// Control values mirrored from the side panel
#[derive(Debug, Clone)]
pub struct Controls {
    pub color: [u8; 3],
    pub wireframe: bool,
    pub xray: bool,
    pub slice_enabled: bool,
    pub slice_level: f32,
    pub projection: Projection,
}

impl Controls {
    fn new(settings: &ViewerSettings) -> Self {
        let c = settings.model_color;
        Self {
            color: [(c >> 16) as u8, (c >> 8) as u8, c as u8],
            wireframe: false,
            xray: false,
            slice_enabled: false,
            slice_level: 0.5,
            projection: Projection::Perspective,
        }
    }

    pub fn color_hex(&self) -> u32 {
        let [r, g, b] = self.color;
        (r as u32) << 16 | (g as u32) << 8 | b as u32
    }
}

/// Everything the panels read and write
pub struct AppState {
    pub viewer: Viewer<GlBackend>,
    /// None when the conversion runtime could not start; loading is disabled
    pub worker: Option<ConversionWorker>,
    pub settings: ViewerSettings,
    pub controls: Controls,
    pub status: String,
    /// File name of the load in flight
    pub loading: Option<String>,
}

impl AppState {
    pub fn new(backend: GlBackend, settings: ViewerSettings) -> Self {
        let viewer = Viewer::new(backend, &settings);
        let (worker, status) = match ConversionWorker::new(StlConverter, settings.load_timeout()) {
            Ok(worker) => (Some(worker), "Open a part to begin".to_string()),
            Err(e) => {
                tracing::error!("{e}");
                (None, format!("Loading unavailable: {e}"))
            }
        };
        Self {
            controls: Controls::new(&settings),
            viewer,
            worker,
            settings,
            status,
            loading: None,
        }
    }

    /// Start converting a file; the result lands on a later frame
    pub fn open_path(&mut self, path: &Path) {
        let Some(worker) = &self.worker else {
            self.status = "Conversion service unavailable".to_string();
            return;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let request = match loader::request_from_path(path) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot open: {e}");
                self.status = format!("Cannot open {name}: {e}");
                return;
            }
        };
        match self.viewer.begin_load(worker, request) {
            Ok(_) => {
                self.status = format!("Loading {name}…");
                self.loading = Some(name);
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    /// Record the outcome of a finished load
    pub fn finish_load(&mut self, result: part_viewer_lib::error::Result<()>) {
        let name = self.loading.take().unwrap_or_default();
        self.status = match result {
            Ok(()) => {
                // Section level and appearance carry over to the new model
                self.apply_appearance();
                self.apply_clipping();
                format!("Loaded {name}")
            }
            Err(e) => format!("Failed to load {name}: {e}"),
        };
    }

    pub fn apply_appearance(&mut self) {
        let c = &self.controls;
        self.viewer
            .set_material_properties(c.color_hex(), c.wireframe, c.xray);
    }

    pub fn apply_clipping(&mut self) {
        let level = self
            .controls
            .slice_enabled
            .then_some(self.controls.slice_level);
        self.viewer.set_clipping(level);
    }
}

/// Main application
pub struct ViewerApp {
    state: AppState,
    started: Instant,
}

impl ViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: ViewerSettings,
        open: Option<&Path>,
    ) -> Result<Self, ViewerError> {
        styles::configure_styles(&cc.egui_ctx);
        let gl = cc
            .gl
            .as_ref()
            .ok_or_else(|| ViewerError::Initialization("no OpenGL context".to_string()))?;
        let backend = GlBackend::new(gl, 800, 600)?;
        let mut state = AppState::new(backend, settings);
        if let Some(path) = open {
            state.open_path(path);
        }
        Ok(Self {
            state,
            started: Instant::now(),
        })
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        keyboard::handle_keyboard(ctx, &mut self.state);

        // ── Menu bar ──────────────────────────────────────────
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                menus::file_menu(ui, &mut self.state);
                menus::view_menu(ui, &mut self.state);
            });
        });

        // ── Status bar ───────────────────────────────────────
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(8, 2)))
            .show(ctx, |ui| {
                status_bar::show(ui, &self.state);
            });

        // ── Right panel: controls ────────────────────────────
        egui::SidePanel::right("controls")
            .default_width(250.0)
            .resizable(true)
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::same(8)))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    controls::show(ui, &mut self.state);
                });
            });

        // ── Central panel: viewport ──────────────────────────
        let now = self.started.elapsed().as_secs_f64();
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                viewport_panel::show(ui, &mut self.state, now);
            });

        ctx.request_repaint();
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        self.state.viewer.dispose();
        if let Some(gl) = gl {
            self.state.viewer.backend().destroy(gl);
        }
    }
}
