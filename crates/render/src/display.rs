//! Host display description
//!
//! Describes the display a page will be presented on. The rasterization
//! scale comes from the windowing layer's display-change notifications;
//! this crate only defines the value type and its derived measures.

/// Base DPI assumed for a 100% scale display.
pub const BASE_DPI: f64 = 96.0;

/// Snapshot of the host display's scaling state
///
/// Recomputed by the caller whenever the display-change notifier fires.
/// All fields are derived from the rasterization scale; the type is a
/// plain value with no behavior beyond the derived accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    /// Rasterization scale factor reported by the compositor (1.0 = 96 DPI)
    pub rasterization_scale: f64,

    /// Scale expressed as a percentage (150 for a 1.5x display)
    pub scaling_percentage: u32,
}

impl DisplayInfo {
    /// Create display info from a rasterization scale factor
    pub fn from_scale(rasterization_scale: f64) -> Self {
        Self {
            rasterization_scale,
            scaling_percentage: (rasterization_scale * 100.0).round() as u32,
        }
    }

    /// Effective DPI of the display (96 × scale)
    pub fn effective_dpi(&self) -> f64 {
        BASE_DPI * self.rasterization_scale
    }

    /// Whether this is a high-DPI display (scale above 1.0)
    pub fn is_high_dpi(&self) -> bool {
        self.rasterization_scale > 1.0
    }
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self::from_scale(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scale_standard() {
        let display = DisplayInfo::from_scale(1.0);
        assert_eq!(display.effective_dpi(), 96.0);
        assert_eq!(display.scaling_percentage, 100);
        assert!(!display.is_high_dpi());
    }

    #[test]
    fn test_from_scale_high_dpi() {
        let display = DisplayInfo::from_scale(1.5);
        assert_eq!(display.effective_dpi(), 144.0);
        assert_eq!(display.scaling_percentage, 150);
        assert!(display.is_high_dpi());
    }

    #[test]
    fn test_from_scale_fractional_percentage() {
        let display = DisplayInfo::from_scale(1.254);
        assert_eq!(display.scaling_percentage, 125);
    }

    #[test]
    fn test_default_is_standard_display() {
        let display = DisplayInfo::default();
        assert_eq!(display.rasterization_scale, 1.0);
        assert!(!display.is_high_dpi());
    }
}
