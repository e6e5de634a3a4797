//! Blend mode policy for overlay compositing
//!
//! The opacity percentage drives the blend mode: a mid-range band selects
//! screen blending, everything else composites source-over. The band
//! bounds are fixed policy, not configuration.

use crate::constants::{SCREEN_BAND_MAX, SCREEN_BAND_MIN};

/// Compositing operator passed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Porter-Duff source-over
    #[default]
    Over,
    /// Screen blending (lightens the background)
    Screen,
}

/// Selects the blend mode for the given opacity percentage.
///
/// Screen is chosen iff the opacity lies strictly inside the
/// (50, 80) band; the bounds themselves, values outside the band, and
/// out-of-range values all composite over.
pub fn select_blend_mode(opacity_percent: i32) -> BlendMode {
    if opacity_percent > SCREEN_BAND_MIN && opacity_percent < SCREEN_BAND_MAX {
        BlendMode::Screen
    } else {
        BlendMode::Over
    }
}
