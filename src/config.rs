/// Light table settings
///
/// Settings are stored as JSON in the user's config directory:
/// - Linux: ~/.config/lighttable/settings.json
/// - macOS: ~/Library/Application Support/lighttable/settings.json
/// - Windows: %APPDATA%\lighttable\settings.json
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Soft drop-shadow drawn around a selected image in single-image mode
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    /// Number of concentric rectangles, one pixel apart
    pub layers: u32,
    /// Alpha multiplier applied per layer, outward
    pub decay: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            layers: 16,
            decay: 0.6,
        }
    }
}

/// All tunables of the light table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Width of the logical mosaic in cells; row `r` starts at `r * max_columns`
    pub max_columns: u32,
    /// Highest zoom level (cells across the viewport)
    pub max_zoom: f32,
    /// Zoom level used for a fresh session
    pub initial_zoom: f32,
    /// Share of the cell a thumbnail may cover in grid mode
    pub grid_thumb_fraction: f32,
    /// Share of the view the image may cover in single-image mode
    pub single_thumb_fraction: f32,
    pub shadow: ShadowStyle,
    /// On-screen width of the inverted ring around selected grid thumbnails
    pub selection_ring_px: f32,
    /// Number of decoded bitmaps kept in memory
    pub cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_columns: 13,
            max_zoom: 13.0,
            initial_zoom: 5.0,
            grid_thumb_fraction: 0.8,
            single_thumb_fraction: 0.97,
            shadow: ShadowStyle::default(),
            selection_ring_px: 2.0,
            cache_capacity: 512,
        }
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("lighttable");
        path.push("settings.json");
        Some(path)
    }

    /// Load settings from `path`, writing defaults there if the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, settings.to_json()?)?;
            log::info!("Wrote default settings to {}", path.display());
            return Ok(settings);
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Convert to a JSON string for storage
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from a JSON string, clamping out-of-range values
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Clamp every value into the range the light table can work with
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.max_columns = self.max_columns.max(1);
        if !self.max_zoom.is_finite() || self.max_zoom < 1.0 {
            self.max_zoom = defaults.max_zoom;
        }
        if !self.initial_zoom.is_finite() {
            self.initial_zoom = defaults.initial_zoom;
        }
        self.initial_zoom = self.initial_zoom.clamp(1.0, self.max_zoom);
        self.grid_thumb_fraction = clamp_fraction(self.grid_thumb_fraction, defaults.grid_thumb_fraction);
        self.single_thumb_fraction =
            clamp_fraction(self.single_thumb_fraction, defaults.single_thumb_fraction);
        self.shadow.decay = clamp_fraction(self.shadow.decay, defaults.shadow.decay);
        if !self.selection_ring_px.is_finite() || self.selection_ring_px < 0.0 {
            self.selection_ring_px = defaults.selection_ring_px;
        }
        self.cache_capacity = self.cache_capacity.max(1);
        self
    }
}

fn clamp_fraction(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value.min(1.0)
    } else {
        fallback
    }
}
