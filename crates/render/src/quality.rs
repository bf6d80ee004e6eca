//! Render quality resolution
//!
//! Maps display scale, user zoom and a quality preset to the effective DPI
//! used for a decode call. The result is clamped to bound worst-case memory
//! for a single page bitmap (upper bound) and guarantee legibility (lower
//! bound).

use crate::display::{DisplayInfo, BASE_DPI};
use thiserror::Error;

/// Lowest DPI ever handed to the decode engine
pub const MIN_DPI: f64 = 50.0;

/// Highest DPI ever handed to the decode engine
pub const MAX_DPI: f64 = 576.0;

/// Errors from quality resolution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QualityError {
    /// Zoom or display scale violated a precondition
    #[error("invalid render parameter: {0}")]
    InvalidParameter(String),
}

/// Render quality preset selected by the user
///
/// Each preset applies a fixed multiplier on top of display scale and zoom.
/// `Low` renders at 75 DPI on a standard display (96 × 0.78125), trading
/// sharpness for speed on constrained machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Auto,
    High,
    Ultra,
}

impl QualityPreset {
    /// DPI multiplier applied by this preset
    pub fn multiplier(&self) -> f64 {
        match self {
            QualityPreset::Low => 0.78125,
            QualityPreset::Auto => 1.0,
            QualityPreset::High => 1.5,
            QualityPreset::Ultra => 2.0,
        }
    }
}

/// Compute the effective DPI for a render request
///
/// `dpi = clamp(96 × scale × zoom × multiplier, 50, 576)`. Pure and
/// idempotent; the same inputs always produce the same DPI.
///
/// # Errors
///
/// Returns `QualityError::InvalidParameter` when `zoom` or the display's
/// rasterization scale is zero, negative, or non-finite.
pub fn resolve(
    display: &DisplayInfo,
    zoom: f64,
    quality: QualityPreset,
) -> Result<f64, QualityError> {
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(QualityError::InvalidParameter(format!(
            "zoom must be positive, got {zoom}"
        )));
    }

    let scale = display.rasterization_scale;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(QualityError::InvalidParameter(format!(
            "rasterization scale must be positive, got {scale}"
        )));
    }

    let dpi = BASE_DPI * scale * zoom * quality.multiplier();
    Ok(dpi.clamp(MIN_DPI, MAX_DPI))
}
