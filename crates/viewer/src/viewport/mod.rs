//! Part viewport: scene state, camera rig and the [`Viewer`] facade
//!
//! The viewer owns every GPU resource it creates through a [`RenderBackend`].
//! Rendering and all scene mutation happen on the owning thread; mesh
//! conversion runs on a [`ConversionWorker`] and lands here through
//! [`Viewer::tick`].

pub mod appearance;
pub mod camera;
pub mod capture;
pub mod clipping;
pub mod edge;
pub mod geometry;
pub mod gl_backend;
pub mod highlight;
pub mod label;
pub mod measure;
pub mod mesh;
pub mod overlay;
pub mod picking;
pub mod renderer;
pub mod software;
pub mod view_cube;

use glam::{Vec2, Vec3};
use image::RgbaImage;
use shared::{ConversionRequest, Projection, RawMesh, Units, ViewPreset};

use crate::error::{Result, ViewerError};
use crate::loader::{ConversionWorker, PendingLoad};
use crate::settings::ViewerSettings;
use appearance::Appearance;
use camera::{zoom_padding, CameraRig};
use clipping::{Clipping, ModelBounds, Plane};
use geometry::GeometryStore;
use highlight::{FocusAnimation, Highlight};
use measure::{MeasureOutcome, MeasureSession, MeasureTool};
use mesh::{hex_to_rgb, LineMeshData};
use overlay::{clamp_graphics_scale, label_height_px, MeasurementOverlay, OverlayStyle};
use renderer::{release_slot, DrawItem, Frame, GpuHandle, Material, Primitive, RenderBackend};
use view_cube::{CubeFace, CubeTarget, SnapAnimation, ViewCube};

/// Padding used when a freshly loaded model is framed
pub const DEFAULT_FIT_PADDING: f32 = 1.3;
const GRID_SIZE: f32 = 1000.0;
const GRID_DIVISIONS: u32 = 50;
const GRID_CENTER_COLOR: u32 = 0xcccccc;
const GRID_LINE_COLOR: u32 = 0xeeeeee;
const AXES_LENGTH: f32 = 200.0;

/// Visibility and color state that captures change and must restore
#[derive(Clone, Debug, PartialEq)]
pub struct SceneState {
    pub grid_visible: bool,
    pub axes_visible: bool,
    pub model_visible: bool,
    pub highlight_visible: bool,
    pub view_cube_visible: bool,
    /// Base clear color (linear RGB)
    pub clear_color: [f32; 3],
    /// Draw the appearance-dependent background over the clear color
    pub background_enabled: bool,
    pub overlay_style: OverlayStyle,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            grid_visible: true,
            axes_visible: true,
            model_visible: true,
            highlight_visible: true,
            view_cube_visible: true,
            clear_color: [1.0, 1.0, 1.0],
            background_enabled: true,
            overlay_style: OverlayStyle::default(),
        }
    }
}

/// Grid and axis helper buffers
#[derive(Debug, Default)]
struct Helpers {
    grid: Option<GpuHandle>,
    axes: Option<GpuHandle>,
}

/// The viewer facade. One instance per viewport; torn down by [`Viewer::dispose`]
/// or on drop.
pub struct Viewer<B: RenderBackend> {
    backend: B,
    camera: CameraRig,
    geometry: GeometryStore,
    clipping: Clipping,
    appearance: Appearance,
    measure: MeasureTool,
    overlay: MeasurementOverlay,
    highlight: Highlight,
    focus: Option<FocusAnimation>,
    view_cube: ViewCube,
    snap: Option<SnapAnimation>,
    scene: SceneState,
    helpers: Helpers,
    graphics_scale: f32,
    outline_angle_deg: f32,
    pending: Option<PendingLoad>,
    /// Time of the last tick (seconds)
    clock: f64,
    disposed: bool,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(mut backend: B, settings: &ViewerSettings) -> Self {
        let [width, height] = backend.size();
        let helpers = Helpers {
            grid: Some(backend.upload_lines(&mesh::grid(
                GRID_SIZE,
                GRID_DIVISIONS,
                GRID_CENTER_COLOR,
                GRID_LINE_COLOR,
            ))),
            axes: Some(backend.upload_lines(&mesh::axes(AXES_LENGTH))),
        };
        let scene = SceneState {
            grid_visible: settings.viewport.show_grid,
            axes_visible: settings.viewport.show_axes,
            view_cube_visible: settings.viewport.show_view_cube,
            clear_color: settings.background_rgb(),
            ..Default::default()
        };
        let view_cube = ViewCube::new(&mut backend);
        let mut measure = MeasureTool::default();
        measure.set_units(settings.measurement.units);

        tracing::info!(width, height, "viewer initialized");
        Self {
            backend,
            camera: CameraRig::new(width, height),
            geometry: GeometryStore::default(),
            clipping: Clipping::default(),
            appearance: Appearance {
                color: settings.model_color,
                ..Default::default()
            },
            measure,
            overlay: MeasurementOverlay::default(),
            highlight: Highlight::default(),
            focus: None,
            view_cube,
            snap: None,
            scene,
            helpers,
            graphics_scale: clamp_graphics_scale(settings.measurement.graphics_scale),
            outline_angle_deg: settings.capture.outline_angle_deg,
            pending: None,
            clock: 0.0,
            disposed: false,
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed {
            Err(ViewerError::Disposed)
        } else {
            Ok(())
        }
    }

    // ── Loading ──────────────────────────────────────────────

    /// Install a mesh, replacing the current one. On error nothing changes.
    pub fn load_mesh(&mut self, raw: &RawMesh) -> Result<()> {
        self.ensure_alive()?;
        let prepared = geometry::prepare(raw).inspect_err(|e| {
            tracing::warn!("mesh rejected: {e}");
        })?;

        self.reset_interaction();
        let bounds = self.geometry.install(&mut self.backend, prepared);
        self.clipping.set_bounds(ModelBounds::from_box(&bounds));
        self.camera.fit_to_box(&bounds, DEFAULT_FIT_PADDING);
        Ok(())
    }

    /// Remove the model. Cached model bounds stay until the next load.
    pub fn clear(&mut self) {
        if self.disposed {
            return;
        }
        self.reset_interaction();
        self.geometry.clear(&mut self.backend);
        tracing::info!("model cleared");
    }

    /// Drop highlight, measurement and overlay tied to the current model
    fn reset_interaction(&mut self) {
        self.highlight.clear(&mut self.backend);
        self.focus = None;
        self.measure.reset();
        self.overlay.clear(&mut self.backend);
    }

    /// Queue an asynchronous conversion. A load already in flight is superseded;
    /// the current model stays visible until the new result arrives.
    pub fn begin_load(&mut self, worker: &ConversionWorker, request: ConversionRequest) -> Result<String> {
        self.ensure_alive()?;
        if let Some(old) = self.pending.take() {
            tracing::warn!(id = %old.id, "pending load superseded");
        }
        let pending = worker.submit(request);
        let id = pending.id.clone();
        self.pending = Some(pending);
        Ok(id)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn poll_load(&mut self) -> Option<Result<()>> {
        let result = self.pending.as_mut()?.poll()?;
        let id = self.pending.take().map(|p| p.id).unwrap_or_default();
        Some(match result {
            Ok(raw) => {
                tracing::info!(%id, triangles = raw.triangle_count(), "conversion finished");
                self.load_mesh(&raw)
            }
            Err(e) => {
                tracing::warn!(%id, "conversion failed: {e}");
                Err(e.into())
            }
        })
    }

    // ── Render loop ──────────────────────────────────────────

    /// One frame: land a finished load, advance animations and damping, draw.
    /// Returns the outcome of a load that completed during this tick.
    pub fn tick(&mut self, now: f64) -> Option<Result<()>> {
        if self.disposed {
            return None;
        }
        self.clock = now;
        let loaded = self.poll_load();

        if let Some(anim) = self.focus {
            let (target, done) = anim.sample(now);
            self.camera.orbit.target = target;
            if done {
                self.focus = None;
            }
        }
        if let Some(anim) = self.snap {
            let (position, done) = anim.sample(now);
            self.camera.position = position;
            self.camera.up = Vec3::Y;
            if done {
                self.snap = None;
            }
        }
        self.camera.update();
        self.render();
        loaded
    }

    /// Draw the current scene
    pub fn render(&mut self) {
        if self.disposed {
            return;
        }
        self.view_cube.sync(&self.camera.view_matrix());
        let frame = self.build_frame(Vec::new());
        self.backend.render(&frame);
    }

    fn build_frame(&self, extra: Vec<DrawItem>) -> Frame {
        let mut items = Vec::new();
        let helper = |handle: GpuHandle| DrawItem {
            handle,
            primitive: Primitive::Lines,
            material: Material::vertex_colored_lines(),
            offset: Vec3::ZERO,
            render_order: 0,
        };
        if self.scene.grid_visible {
            items.extend(self.helpers.grid.map(helper));
        }
        if self.scene.axes_visible {
            items.extend(self.helpers.axes.map(helper));
        }
        if self.scene.model_visible {
            if let Some(model) = self.geometry.model() {
                items.push(DrawItem {
                    handle: model.handle,
                    primitive: Primitive::Triangles,
                    material: self.appearance.model_material(self.clipping.planes()),
                    offset: model.root_offset,
                    render_order: 0,
                });
            }
        }
        if self.scene.highlight_visible {
            items.extend(self.highlight.draw_item());
        }
        let label_px = label_height_px(
            self.graphics_scale,
            self.camera.perspective.fov_deg,
            self.camera.viewport()[1],
        );
        items.extend(self.overlay.draw_items(&self.scene.overlay_style, label_px));
        items.extend(extra);

        let background = if self.scene.background_enabled {
            self.appearance.background(self.scene.clear_color)
        } else {
            None
        };
        let insets = if self.scene.view_cube_visible {
            self.view_cube.inset(self.camera.viewport()).into_iter().collect()
        } else {
            Vec::new()
        };
        Frame {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            camera_position: self.camera.position,
            clear_color: self.scene.clear_color,
            background,
            items,
            insets,
        }
    }

    /// Last rendered frame
    pub fn last_frame(&mut self) -> RgbaImage {
        self.backend.read_pixels()
    }

    // ── Camera ───────────────────────────────────────────────

    pub fn set_view(&mut self, preset: ViewPreset) {
        self.focus = None;
        self.snap = None;
        self.camera.set_view(preset);
    }

    pub fn set_projection(&mut self, mode: Projection) {
        self.camera.set_projection(mode);
    }

    /// Resize both cameras and the output surface. Safe with no model loaded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
        if !self.disposed {
            self.backend.resize(width, height);
        }
    }

    /// Frame the model; larger `zoom` frames tighter. No-op without a model.
    pub fn fit_to_screen(&mut self, zoom: f32) {
        if let Some(bounds) = self.geometry.world_bounds() {
            self.focus = None;
            self.snap = None;
            self.camera.fit_to_box(&bounds, zoom_padding(zoom));
        }
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    /// Orbit input (drag, scroll, pan) from the host
    pub fn orbit_mut(&mut self) -> &mut camera::OrbitControls {
        &mut self.camera.orbit
    }

    // ── View cube ────────────────────────────────────────────

    pub fn set_show_view_cube(&mut self, visible: bool) {
        self.scene.view_cube_visible = visible;
        if !visible {
            self.view_cube.hover(self.camera.viewport(), None);
        }
    }

    pub fn show_view_cube(&self) -> bool {
        self.scene.view_cube_visible
    }

    /// Pointer moved to `pos` (viewport pixels, origin top-left), `None` when it
    /// left the viewport. Returns true while the pointer is over the cube.
    pub fn view_cube_hover(&mut self, pos: Option<Vec2>) -> bool {
        if self.disposed || !self.scene.view_cube_visible {
            return false;
        }
        self.view_cube.hover(self.camera.viewport(), pos)
    }

    /// Click at `pos`: a face selects its view preset, an edge or corner swings
    /// the camera onto that diagonal. Returns what was hit.
    pub fn view_cube_click(&mut self, pos: Vec2) -> Option<CubeTarget> {
        if self.disposed || !self.scene.view_cube_visible {
            return None;
        }
        let target = self.view_cube.click(self.camera.viewport(), pos)?;
        match &target {
            CubeTarget::Face(face) => self.set_view(face.preset()),
            CubeTarget::Diagonal { direction, .. } => {
                let distance = view_cube::snap_distance(
                    self.camera.distance(),
                    self.model_dimensions(),
                    self.camera.perspective.fov_deg,
                );
                let to = self.camera.orbit.target + *direction * distance;
                self.focus = None;
                self.camera.orbit.stop();
                self.snap = Some(SnapAnimation::new(self.camera.position, to, self.clock));
            }
        }
        tracing::debug!(?target, "view cube clicked");
        Some(target)
    }

    pub fn view_cube_hovered(&self) -> &[CubeFace] {
        self.view_cube.hovered()
    }

    /// Cube orientation: the inverse of the camera rotation as of the last render
    pub fn view_cube_rotation(&self) -> glam::Quat {
        self.view_cube.rotation()
    }

    pub fn is_snapping(&self) -> bool {
        self.snap.is_some()
    }

    // ── Picking & measurement ────────────────────────────────

    /// Nearest model surface point under a normalized device coordinate
    pub fn pick_at_screen_position(&self, ndc_x: f32, ndc_y: f32) -> Option<Vec3> {
        if self.disposed {
            return None;
        }
        let ray = self.camera.screen_ray(ndc_x, ndc_y);
        let hit = self.geometry.pick(&ray);
        tracing::debug!(ndc_x, ndc_y, hit = ?hit.as_ref().map(|h| h.point), "pick");
        hit.map(|h| h.point)
    }

    /// Show a measurement overlay for an externally managed segment.
    /// Any missing endpoint clears the overlay.
    pub fn set_measurement_segment(&mut self, p1: Option<Vec3>, p2: Option<Vec3>, label: Option<&str>) {
        if self.disposed {
            return;
        }
        match (p1, p2) {
            (Some(p1), Some(p2)) => self.overlay.set_segment(
                &mut self.backend,
                p1,
                p2,
                label,
                self.graphics_scale,
                self.camera.position,
            ),
            _ => self.overlay.clear(&mut self.backend),
        }
    }

    pub fn set_measurement_graphics_scale(&mut self, scale: f32) {
        if self.disposed {
            return;
        }
        self.graphics_scale = clamp_graphics_scale(scale);
        self.overlay
            .rebuild(&mut self.backend, self.graphics_scale, self.camera.position);
    }

    pub fn graphics_scale(&self) -> f32 {
        self.graphics_scale
    }

    pub fn set_measure_mode(&mut self, enabled: bool) {
        self.measure.set_enabled(enabled);
        if !enabled && !self.disposed {
            self.overlay.clear(&mut self.backend);
        }
    }

    pub fn measure_mode(&self) -> bool {
        self.measure.is_enabled()
    }

    /// Handle a click in measure mode
    pub fn click(&mut self, ndc_x: f32, ndc_y: f32) -> MeasureOutcome {
        if self.disposed || !self.measure.is_enabled() {
            return MeasureOutcome::Inactive;
        }
        let hit = self.pick_at_screen_position(ndc_x, ndc_y);
        let outcome = self.measure.register_pick(hit);
        match outcome {
            MeasureOutcome::FirstPoint(_) => self.overlay.clear(&mut self.backend),
            MeasureOutcome::Completed { p1, p2, distance_mm } => {
                tracing::debug!(distance_mm, "measurement completed");
                self.show_session_overlay(p1, p2);
            }
            MeasureOutcome::Inactive | MeasureOutcome::Missed => {}
        }
        outcome
    }

    fn show_session_overlay(&mut self, p1: Vec3, p2: Vec3) {
        let label = self.measure.label();
        self.overlay.set_segment(
            &mut self.backend,
            p1,
            p2,
            label.as_deref(),
            self.graphics_scale,
            self.camera.position,
        );
    }

    /// Change display units; a finished measurement is relabeled, not re-measured
    pub fn set_units(&mut self, units: Units) {
        self.measure.set_units(units);
        if self.disposed {
            return;
        }
        if let Some((p1, p2)) = self.measure.session().segment() {
            self.show_session_overlay(p1, p2);
        }
    }

    pub fn units(&self) -> Units {
        self.measure.units()
    }

    pub fn measurement_session(&self) -> &MeasureSession {
        self.measure.session()
    }

    /// Distance of the finished measurement (mm)
    pub fn measurement_mm(&self) -> Option<f64> {
        self.measure.session().distance_mm()
    }

    /// Current measurement label in display units
    pub fn measurement_label(&self) -> Option<String> {
        self.measure.label()
    }

    pub fn overlay_entity_count(&self) -> usize {
        self.overlay.entity_count()
    }

    // ── Appearance & clipping ────────────────────────────────

    pub fn set_material_properties(&mut self, color: u32, wireframe: bool, xray: bool) {
        self.appearance = Appearance {
            color,
            wireframe,
            xray,
        };
        tracing::debug!(color = format_args!("{color:#08x}"), wireframe, xray, "appearance updated");
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    /// Material the model is drawn with (None without a model)
    pub fn model_material(&self) -> Option<Material> {
        self.geometry
            .model()
            .map(|_| self.appearance.model_material(self.clipping.planes()))
    }

    /// Slice level in [0, 1]; `None` disables clipping
    pub fn set_clipping(&mut self, level: Option<f32>) {
        self.clipping.set_level(level);
    }

    pub fn clipping_level(&self) -> Option<f32> {
        self.clipping.level()
    }

    pub fn clipping_planes(&self) -> &[Plane] {
        self.clipping.planes()
    }

    pub fn model_bounds(&self) -> ModelBounds {
        self.clipping.bounds()
    }

    pub fn set_background_color(&mut self, color: u32) {
        self.scene.clear_color = hex_to_rgb(color);
    }

    pub fn set_helpers_visible(&mut self, grid: bool, axes: bool) {
        self.scene.grid_visible = grid;
        self.scene.axes_visible = axes;
    }

    pub fn scene_state(&self) -> &SceneState {
        &self.scene
    }

    // ── Model queries & highlight ────────────────────────────

    /// Bounding-box size of the loaded model (mm)
    pub fn model_dimensions(&self) -> Option<Vec3> {
        self.geometry.dimensions()
    }

    /// World-space bounds of the grounded model
    pub fn model_world_bounds(&self) -> Option<picking::Aabb> {
        self.geometry.world_bounds()
    }

    /// Highlight triangles of the loaded model by index and optionally move the
    /// orbit target to `location`. `None` or an empty list removes the highlight.
    pub fn set_highlight(&mut self, triangles: Option<&[usize]>, location: Option<Vec3>) {
        if self.disposed {
            return;
        }
        let offset = self.geometry.model().map(|m| m.root_offset).unwrap_or(Vec3::ZERO);
        let tris = self.geometry.extract_triangles(triangles.unwrap_or_default());
        self.highlight.set(&mut self.backend, &tris, offset);
        if let Some(to) = location {
            self.focus = Some(FocusAnimation::new(self.camera.orbit.target, to, self.clock));
        }
    }

    pub fn highlight_active(&self) -> bool {
        self.highlight.is_active()
    }

    pub fn is_focusing(&self) -> bool {
        self.focus.is_some()
    }

    // ── Resources & teardown ─────────────────────────────────

    pub fn live_resources(&self) -> usize {
        self.backend.live_resources()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release every GPU resource and stop accepting work. Runs once; later
    /// calls return false.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.reset_interaction();
        self.geometry.clear(&mut self.backend);
        release_slot(&mut self.backend, &mut self.helpers.grid);
        release_slot(&mut self.backend, &mut self.helpers.axes);
        self.view_cube.release(&mut self.backend);
        self.snap = None;
        if let Some(pending) = self.pending.take() {
            tracing::debug!(id = %pending.id, "pending load dropped on dispose");
        }
        self.disposed = true;
        tracing::info!(live = self.backend.live_resources(), "viewer disposed");
        true
    }

    /// Feature-edge outline of the loaded model, if any, with its world offset
    fn model_outline(&self) -> Option<(LineMeshData, Vec3)> {
        let model = self.geometry.model()?;
        let lines = edge::outline_edges(&model.mesh, self.outline_angle_deg, [0.0, 0.0, 0.0, 1.0]);
        Some((lines, model.root_offset))
    }
}

impl<B: RenderBackend> Drop for Viewer<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
