use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Per-frame switches for overlay fading and debug drawing.
///
/// Handed to the render queue builder and batch emitter at the start of each
/// frame; nothing in this crate keeps a global copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    /// Fade every overlay by viewer distance, ignoring per-overlay fade ranges.
    pub global_fade_enabled: bool,
    /// Distance at which global fading starts.
    pub fade_min_distance: f32,
    /// Distance at which overlays are fully faded out.
    pub fade_max_distance: f32,
    /// Draw fragments as wireframe only.
    pub wireframe_only: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            global_fade_enabled: false,
            fade_min_distance: 600.0,
            fade_max_distance: 800.0,
            wireframe_only: false,
        }
    }
}

impl OverlayConfig {
    /// Enable global distance fading between `min` and `max`.
    #[must_use]
    pub fn with_global_fade(mut self, min: f32, max: f32) -> Self {
        self.global_fade_enabled = true;
        self.fade_min_distance = min;
        self.fade_max_distance = max;
        self
    }

    /// Enable or disable wireframe-only drawing.
    #[must_use]
    pub fn with_wireframe(mut self, wireframe_only: bool) -> Self {
        self.wireframe_only = wireframe_only;
        self
    }

    /// Parse a config from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a config from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
