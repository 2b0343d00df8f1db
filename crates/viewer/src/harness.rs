//! Headless viewer harness for tests and thumbnail rendering.
//!
//! Wraps a [`Viewer`] over the software backend with a fixed-step clock and
//! helpers to click on world points and wait for asynchronous loads.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use image::RgbaImage;

use crate::error::Result;
use crate::loader::parse_stl;
use crate::settings::ViewerSettings;
use crate::viewport::measure::MeasureOutcome;
use crate::viewport::software::SoftwareBackend;
use crate::viewport::Viewer;

/// Seconds per simulated frame
pub const FRAME_TIME: f64 = 1.0 / 60.0;

/// Headless viewer with a simulated clock
pub struct ViewerHarness {
    pub viewer: Viewer<SoftwareBackend>,
    clock: f64,
}

impl ViewerHarness {
    /// 320×240 viewer with default settings
    pub fn new() -> Self {
        Self::with_size(320, 240)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, &ViewerSettings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: &ViewerSettings) -> Self {
        Self {
            viewer: Viewer::new(SoftwareBackend::new(width, height), settings),
            clock: 0.0,
        }
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    // ── Loading ───────────────────────────────────────────────

    pub fn load_box(&mut self, width: f32, height: f32, depth: f32) -> Result<()> {
        self.viewer
            .load_mesh(&crate::fixtures::box_mesh(width, height, depth))
    }

    /// Decode STL bytes on the calling thread and install the result
    pub fn load_stl(&mut self, bytes: &[u8]) -> Result<()> {
        let raw = parse_stl(bytes)?;
        self.viewer.load_mesh(&raw)
    }

    /// Tick until a pending load completes or `timeout` passes
    pub fn wait_for_load(&mut self, timeout: Duration) -> Option<Result<()>> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(result) = self.step() {
                return Some(result);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    // ── Frames ────────────────────────────────────────────────

    /// Advance one frame
    pub fn step(&mut self) -> Option<Result<()>> {
        self.clock += FRAME_TIME;
        self.viewer.tick(self.clock)
    }

    /// Advance `frames` frames, ignoring load completions
    pub fn run(&mut self, frames: usize) {
        for _ in 0..frames {
            self.step();
        }
    }

    /// Render the current state and return the frame
    pub fn frame(&mut self) -> RgbaImage {
        self.viewer.render();
        self.viewer.last_frame()
    }

    // ── Interaction ───────────────────────────────────────────

    /// Normalized device coordinates of a world point (None if behind the camera)
    pub fn ndc_of(&self, world: Vec3) -> Option<Vec2> {
        self.viewer.camera().project(world).map(|p| p.truncate())
    }

    /// Click where `world` appears on screen
    pub fn click_world(&mut self, world: Vec3) -> MeasureOutcome {
        match self.ndc_of(world) {
            Some(ndc) => self.viewer.click(ndc.x, ndc.y),
            None => MeasureOutcome::Missed,
        }
    }
}

impl Default for ViewerHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ViewerHarness {
    type Target = Viewer<SoftwareBackend>;

    fn deref(&self) -> &Self::Target {
        &self.viewer
    }
}

impl DerefMut for ViewerHarness {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.viewer
    }
}
