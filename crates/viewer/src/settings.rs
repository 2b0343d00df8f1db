//! Viewer settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::Units;

use crate::viewport::appearance::DEFAULT_MODEL_COLOR;

/// Viewport display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportSettings {
    /// Base background color RGB
    pub background_color: [u8; 3],
    /// Show the reference grid
    pub show_grid: bool,
    /// Show the axis helper
    pub show_axes: bool,
    /// Show the orientation cube in the bottom-right corner
    #[serde(default = "default_show_view_cube")]
    pub show_view_cube: bool,
}

fn default_show_view_cube() -> bool {
    true
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            background_color: [255, 255, 255],
            show_grid: true,
            show_axes: true,
            show_view_cube: default_show_view_cube(),
        }
    }
}

/// Measurement display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSettings {
    /// Display units for distances
    pub units: Units,
    /// Overlay size multiplier, clamped to [0.1, 4] on use
    pub graphics_scale: f32,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            units: Units::Millimeters,
            graphics_scale: 0.6,
        }
    }
}

/// Snapshot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Feature-edge angle for outline captures (degrees)
    pub outline_angle_deg: f32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            outline_angle_deg: 40.0,
            thumbnail_width: 512,
            thumbnail_height: 512,
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default)]
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub measurement: MeasurementSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
    /// Default model color 0xRRGGBB
    #[serde(default = "default_model_color")]
    pub model_color: u32,
    /// Mesh conversion timeout in seconds
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

fn default_model_color() -> u32 {
    DEFAULT_MODEL_COLOR
}

fn default_load_timeout() -> u64 {
    60
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            viewport: ViewportSettings::default(),
            measurement: MeasurementSettings::default(),
            capture: CaptureSettings::default(),
            model_color: default_model_color(),
            load_timeout_secs: default_load_timeout(),
        }
    }
}

impl ViewerSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs.max(1))
    }

    /// Background as linear RGB in [0, 1]
    pub fn background_rgb(&self) -> [f32; 3] {
        self.viewport.background_color.map(|c| c as f32 / 255.0)
    }

    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "partviewer", "part-viewer")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from the config dir, or defaults if missing or unreadable
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable settings: {e}");
                Self::default()
            }
        }
    }

    /// Save settings to the config dir. Failures are logged and ignored.
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                tracing::warn!(path = %path.display(), "failed to save settings: {e}");
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("part-viewer-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults() {
        let s = ViewerSettings::default();
        assert_eq!(s.measurement.graphics_scale, 0.6);
        assert_eq!(s.model_color, 0xb8c2ff);
        assert_eq!(s.capture.outline_angle_deg, 40.0);
        assert_eq!(s.load_timeout(), Duration::from_secs(60));
        assert_eq!(s.background_rgb(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_path("settings.json");
        let mut s = ViewerSettings::default();
        s.measurement.units = Units::Inches;
        s.viewport.show_grid = false;
        s.save_to(&path).unwrap();
        assert_eq!(ViewerSettings::load_from(&path), s);
    }

    #[test]
    fn test_missing_or_corrupt_file_falls_back() {
        let path = temp_path("settings.json");
        assert_eq!(ViewerSettings::load_from(&path), ViewerSettings::default());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ViewerSettings::load_from(&path), ViewerSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "load_timeout_secs": 5 }"#).unwrap();
        let s = ViewerSettings::load_from(&path);
        assert_eq!(s.load_timeout_secs, 5);
        assert_eq!(s.measurement, MeasurementSettings::default());
    }

    #[test]
    fn test_viewport_section_without_view_cube_flag_shows_cube() {
        let path = temp_path("settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{ "viewport": { "background_color": [10, 20, 30], "show_grid": false, "show_axes": true } }"#,
        )
        .unwrap();
        let s = ViewerSettings::load_from(&path);
        assert!(!s.viewport.show_grid);
        assert!(s.viewport.show_view_cube);
    }
}
