//! Font color parsing for text watermarks
//!
//! Colors arrive as bare hex digits (`ff0000`), not CSS `#`-prefixed
//! notation. The value is parsed as one base-16 number and the low 24 bits
//! are split into channels; longer values truncate silently.

use crate::error::WatermarkError;

/// RGB color for label rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn black() -> Self {
        Rgb { r: 0, g: 0, b: 0 }
    }

    pub fn white() -> Self {
        Rgb {
            r: 255,
            g: 255,
            b: 255,
        }
    }
}

/// Parses a hex color value into its RGB channels.
///
/// The whole value must parse as a base-16 `u32`; there is no length
/// check. Short values fill from the low bits (`"1234"` is `g=0x12,
/// b=0x34`) and values wider than 24 bits lose their high bits.
///
/// # Arguments
/// * `value` - Hex digits without any prefix
///
/// # Returns
/// The extracted color, or `InvalidColor` when the value is not a
/// base-16 number that fits in 32 bits.
pub fn parse_hex_color(value: &str) -> Result<Rgb, WatermarkError> {
    let bits =
        u32::from_str_radix(value, 16).map_err(|_| WatermarkError::invalid_color(value))?;

    Ok(Rgb {
        r: (bits >> 16) as u8,
        g: (bits >> 8) as u8,
        b: bits as u8,
    })
}
