// Configuration module

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{DEFAULT_FONT_FAMILY, DEFAULT_GRAVITY, DEFAULT_OPACITY_PERCENT};

// Default values
fn default_gravity() -> String {
    DEFAULT_GRAVITY.to_string()
}

fn default_opacity_percent() -> i32 {
    DEFAULT_OPACITY_PERCENT
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

/// Watermark command defaults.
///
/// Every field falls back to a named constant, so an empty YAML document
/// is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Gravity code used when a command supplies none (default: "se")
    #[serde(default = "default_gravity")]
    pub default_gravity: String,

    /// Opacity percent used when a command supplies none (default: 100)
    #[serde(default = "default_opacity_percent")]
    pub default_opacity_percent: i32,

    /// Font family used when a text command supplies none
    #[serde(default = "default_font_family")]
    pub default_font_family: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        WatermarkConfig {
            default_gravity: default_gravity(),
            default_opacity_percent: default_opacity_percent(),
            default_font_family: default_font_family(),
        }
    }
}

impl WatermarkConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_font_family.is_empty() {
            return Err("default_font_family cannot be empty".to_string());
        }

        if self.default_opacity_percent <= 0 {
            return Err(format!(
                "default_opacity_percent must be positive, got {}",
                self.default_opacity_percent
            ));
        }

        Ok(())
    }
}
