// Constants module - centralized default values for watermark commands
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Parameter defaults
// =============================================================================

/// Default gravity code when the command supplies none (south-east corner)
pub const DEFAULT_GRAVITY: &str = "se";

/// Default watermark opacity in percent
pub const DEFAULT_OPACITY_PERCENT: i32 = 100;

/// Default font family for text watermarks
pub const DEFAULT_FONT_FAMILY: &str = "OPPOSans R";

// =============================================================================
// Label geometry
// =============================================================================

/// Nominal label box width in pixels used for placement
pub const LABEL_NOMINAL_WIDTH: u32 = 200;

/// Label box height as a fraction of the font size
pub const LABEL_HEIGHT_FACTOR: f64 = 0.75;

// =============================================================================
// Blend policy
// =============================================================================

/// Exclusive lower bound of the opacity band that selects screen blending
pub const SCREEN_BAND_MIN: i32 = 50;

/// Exclusive upper bound of the opacity band that selects screen blending
pub const SCREEN_BAND_MAX: i32 = 80;
