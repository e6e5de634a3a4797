//! Watermark command parameter parsing
//!
//! Commands arrive as ordered `key_value` tokens, e.g.
//! `image_bG9nby5wbmc`, `g_nw`, `x_10`, `t_60`. String-valued parameters
//! (`image`, `text`, `type`) are URL-safe base64; numeric parameters are
//! decimal integers; `g` and `color` are taken verbatim.
//!
//! Tokens fold into [`WatermarkParams`] in input order: a repeated key
//! overwrites the earlier value, unknown keys are skipped, and the first
//! malformed token aborts the whole command.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::config::WatermarkConfig;
use crate::constants::{DEFAULT_GRAVITY, DEFAULT_OPACITY_PERCENT};
use crate::error::WatermarkError;

/// URL-safe alphabet accepting both padded and unpadded values
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Accumulated watermark command parameters
///
/// String fields use the empty string for "not supplied"; the dispatcher
/// branches on `overlay_path` and `text` being non-empty.
#[derive(Debug, Clone)]
pub struct WatermarkParams {
    // === Placement ===
    /// Raw horizontal offset before gravity resolution
    pub offset_x: i32,
    /// Raw vertical offset before gravity resolution
    pub offset_y: i32,
    /// Gravity code, stored verbatim; resolved (with fallback) at dispatch
    pub gravity: String,
    /// Opacity in percent; also drives blend mode selection
    pub opacity_percent: i32,

    // === Image overlay ===
    /// Decoded overlay path, relative to the per-request object prefix
    pub overlay_path: String,
    /// Overlay scale in percent; 0 means no resize
    pub overlay_scale_percent: i32,

    // === Text label ===
    /// Decoded label text
    pub text: String,
    /// Decoded font family; empty means the configured default
    pub font_family: String,
    /// Verbatim hex color; empty means the engine default
    pub font_color: String,
    /// Font size in points
    pub font_size: i32,
    /// Shadow intensity passed through to the engine
    pub shadow: i32,
    /// Rotation in degrees passed through to the engine
    pub rotate_degrees: i32,
    /// Fill mode flag passed through to the engine
    pub fill_mode: i32,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        WatermarkParams {
            offset_x: 0,
            offset_y: 0,
            gravity: DEFAULT_GRAVITY.to_string(),
            opacity_percent: DEFAULT_OPACITY_PERCENT,
            overlay_path: String::new(),
            overlay_scale_percent: 0,
            text: String::new(),
            font_family: String::new(),
            font_color: String::new(),
            font_size: 0,
            shadow: 0,
            rotate_degrees: 0,
            fill_mode: 0,
        }
    }
}

impl WatermarkParams {
    /// Seed the parameter defaults from the configuration record.
    pub fn from_config(config: &WatermarkConfig) -> Self {
        WatermarkParams {
            gravity: config.default_gravity.clone(),
            opacity_percent: config.default_opacity_percent,
            ..Default::default()
        }
    }

    /// Fold an ordered token list into parameters.
    ///
    /// Tokens apply in input order and later tokens win. The fold stops
    /// at the first malformed token; no partial result escapes.
    pub fn from_tokens<'a, I>(config: &WatermarkConfig, tokens: I) -> Result<Self, WatermarkError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut params = Self::from_config(config);
        for token in tokens {
            params.apply_token(token)?;
        }
        Ok(params)
    }

    /// Apply one `key_value` token.
    ///
    /// The token must split on `_` into exactly two parts. Unknown keys
    /// are ignored so unrelated pipeline parameters can share the list.
    pub fn apply_token(&mut self, token: &str) -> Result<(), WatermarkError> {
        let mut parts = token.split('_');
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => (key, value),
            _ => return Err(WatermarkError::malformed_token(token)),
        };

        match key {
            "x" => self.offset_x = parse_int("x", value)?,
            "y" => self.offset_y = parse_int("y", value)?,
            "g" => self.gravity = value.to_string(),
            "t" => self.opacity_percent = parse_int("t", value)?,
            "image" => self.overlay_path = decode_text("image", value)?,
            "P" => self.overlay_scale_percent = parse_int("P", value)?,
            "text" => self.text = decode_text("text", value)?,
            "type" => self.font_family = decode_text("type", value)?,
            "color" => self.font_color = value.to_string(),
            "size" => self.font_size = parse_int("size", value)?,
            "shadow" => self.shadow = parse_int("shadow", value)?,
            "rotate" => self.rotate_degrees = parse_int("rotate", value)?,
            "fill" => self.fill_mode = parse_int("fill", value)?,
            _ => {
                tracing::debug!(key = %key, "ignoring unknown watermark parameter");
            }
        }

        Ok(())
    }

    /// True when the command names an image overlay.
    pub fn has_overlay(&self) -> bool {
        !self.overlay_path.is_empty()
    }

    /// True when the command names a text label.
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<i32, WatermarkError> {
    value
        .parse::<i32>()
        .map_err(|_| WatermarkError::invalid_numeric(key, value))
}

fn decode_text(key: &'static str, value: &str) -> Result<String, WatermarkError> {
    let bytes = BASE64_URL_LENIENT
        .decode(value)
        .map_err(|e| WatermarkError::invalid_encoded(key, e.to_string()))?;

    String::from_utf8(bytes)
        .map_err(|_| WatermarkError::invalid_encoded(key, "decoded value is not valid UTF-8"))
}
