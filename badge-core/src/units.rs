//! Conversion between document millimetres, screen pixels and export pixels.
//!
//! ```text
//! screen_px = mm * (screen_dpi / 25.4) * (zoom / 100)
//! export_px = mm * (export_dpi / 25.4) * multiplier
//! ```
//!
//! Inputs outside the supported ranges are clamped, never wrapped. Non-finite
//! inputs fall back to the default of the respective range.

use serde::{Deserialize, Serialize};

use crate::Dimensions;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Smallest zoom in percent.
pub const MIN_ZOOM: f64 = 10.0;
/// Largest zoom in percent.
pub const MAX_ZOOM: f64 = 400.0;
/// Zoom used when none (or garbage) is given.
pub const DEFAULT_ZOOM: f64 = 100.0;

/// Smallest accepted resolution.
pub const MIN_DPI: f64 = 72.0;
/// Largest accepted resolution.
pub const MAX_DPI: f64 = 1200.0;
/// Nominal CSS screen resolution.
pub const DEFAULT_SCREEN_DPI: f64 = 96.0;

/// Smallest export multiplier.
pub const MIN_MULTIPLIER: f64 = 0.1;
/// Largest export multiplier.
pub const MAX_MULTIPLIER: f64 = 16.0;

/// Largest raster an export may allocate, in pixels (16384 x 16384).
pub const MAX_RASTER_PIXELS: u64 = 1 << 28;

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Clamp a zoom percentage into `[10, 400]`.
#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    clamp_or(zoom, MIN_ZOOM, MAX_ZOOM, DEFAULT_ZOOM)
}

/// Clamp a resolution into `[72, 1200]`.
#[must_use]
pub fn clamp_dpi(dpi: f64) -> f64 {
    clamp_or(dpi, MIN_DPI, MAX_DPI, DEFAULT_SCREEN_DPI)
}

/// Clamp an export multiplier into `[0.1, 16]`.
#[must_use]
pub fn clamp_multiplier(multiplier: f64) -> f64 {
    clamp_or(multiplier, MIN_MULTIPLIER, MAX_MULTIPLIER, 1.0)
}

/// Screen pixels per millimetre at the given resolution and zoom.
#[must_use]
pub fn screen_scale(screen_dpi: f64, zoom: f64) -> f64 {
    clamp_dpi(screen_dpi) / MM_PER_INCH * (clamp_zoom(zoom) / 100.0)
}

/// Export pixels per millimetre at the given resolution and multiplier.
#[must_use]
pub fn export_scale(export_dpi: f64, multiplier: f64) -> f64 {
    clamp_dpi(export_dpi) / MM_PER_INCH * clamp_multiplier(multiplier)
}

/// Document mm to screen pixels.
#[must_use]
pub fn mm_to_screen_px(mm: f64, screen_dpi: f64, zoom: f64) -> f64 {
    mm * screen_scale(screen_dpi, zoom)
}

/// Screen pixels to document mm.
#[must_use]
pub fn screen_px_to_mm(px: f64, screen_dpi: f64, zoom: f64) -> f64 {
    px / screen_scale(screen_dpi, zoom)
}

/// Document mm to export pixels.
#[must_use]
pub fn mm_to_export_px(mm: f64, export_dpi: f64, multiplier: f64) -> f64 {
    mm * export_scale(export_dpi, multiplier)
}

/// Export pixels to document mm.
#[must_use]
pub fn export_px_to_mm(px: f64, export_dpi: f64, multiplier: f64) -> f64 {
    px / export_scale(export_dpi, multiplier)
}

/// Typographic points to mm.
#[must_use]
pub fn pt_to_mm(pt: f64) -> f64 {
    pt * MM_PER_INCH / 72.0
}

/// Whole-pixel raster size of a card side, rounded to nearest, at least 1x1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn raster_size(dimensions: &Dimensions, export_dpi: f64, multiplier: f64) -> (u32, u32) {
    let to_px = |mm: f64| {
        let px = mm_to_export_px(mm, export_dpi, multiplier).round();
        px.clamp(1.0, f64::from(u32::MAX)) as u32
    };
    (to_px(dimensions.width), to_px(dimensions.height))
}

/// Whether a `width` x `height` raster stays within [`MAX_RASTER_PIXELS`].
#[must_use]
pub fn within_raster_budget(width: u32, height: u32) -> bool {
    u64::from(width) * u64::from(height) <= MAX_RASTER_PIXELS
}

/// Zoom and resolution of the interactive editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    zoom: f64,
    screen_dpi: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            screen_dpi: DEFAULT_SCREEN_DPI,
        }
    }
}

impl Viewport {
    /// Create a viewport; both values are clamped.
    #[must_use]
    pub fn new(zoom: f64, screen_dpi: f64) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            screen_dpi: clamp_dpi(screen_dpi),
        }
    }

    /// Current zoom in percent.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Screen resolution.
    #[must_use]
    pub fn screen_dpi(&self) -> f64 {
        self.screen_dpi
    }

    /// Set the zoom, clamped to `[10, 400]`.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(zoom);
    }

    /// Document mm to screen pixels.
    #[must_use]
    pub fn to_screen(&self, mm: f64) -> f64 {
        mm_to_screen_px(mm, self.screen_dpi, self.zoom)
    }

    /// Screen pixels to document mm.
    #[must_use]
    pub fn to_document(&self, px: f64) -> f64 {
        screen_px_to_mm(px, self.screen_dpi, self.zoom)
    }
}
