//! Editor session configuration.

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::units::DEFAULT_SCREEN_DPI;
use crate::CardResult;

/// Snapping behaviour for move gestures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapSettings {
    /// Master switch.
    pub enabled: bool,
    /// Grid pitch in mm; `0` disables grid snapping.
    pub grid_mm: f64,
    /// Capture distance in screen pixels.
    pub tolerance_px: f64,
    /// Vertical guides (x positions in mm).
    pub vertical_guides: Vec<f64>,
    /// Horizontal guides (y positions in mm).
    pub horizontal_guides: Vec<f64>,
    /// Snap to the bleed boundary.
    pub snap_to_bleed: bool,
    /// Snap to the safe-area boundary.
    pub snap_to_safe_area: bool,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_mm: 1.0,
            tolerance_px: 5.0,
            vertical_guides: Vec::new(),
            horizontal_guides: Vec::new(),
            snap_to_bleed: true,
            snap_to_safe_area: true,
        }
    }
}

/// Settings for one editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Snapshots kept on each history stack.
    pub history_depth: usize,
    /// Resolution of the editing surface.
    pub screen_dpi: f64,
    /// Offset applied to duplicated elements, in mm.
    pub duplicate_offset_mm: f64,
    /// Snapping behaviour.
    pub snap: SnapSettings,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            screen_dpi: DEFAULT_SCREEN_DPI,
            duplicate_offset_mm: 2.0,
            snap: SnapSettings::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a configuration; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CardError::Serialization`] on malformed JSON.
    pub fn from_json(json: &str) -> CardResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
