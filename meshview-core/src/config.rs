/// Viewer configuration, loadable from TOML
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::framing::DEFAULT_FRAMING_MARGIN;
use crate::material::{Color, DisplayMode};
use crate::normalize::DEFAULT_CANONICAL_SIZE;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub canonical_size: f32,
    pub framing_margin: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub base_color: Color,
    pub background: Color,
    pub display_mode: DisplayMode,
    pub min_distance: f32,
    pub max_distance: f32,
    pub zoom_speed: f32,
    pub damping: Option<f32>,
    pub target_fps: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            canonical_size: DEFAULT_CANONICAL_SIZE,
            framing_margin: DEFAULT_FRAMING_MARGIN,
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            base_color: Color::from_rgb8(0x00, 0xb8, 0xd4),
            background: Color::from_rgb8(0x1a, 0x1a, 0x1a),
            display_mode: DisplayMode::Normal,
            min_distance: 0.5,
            max_distance: 200.0,
            zoom_speed: 1.5,
            damping: None,
            target_fps: 30,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, message: &str| {
            Err(ConfigError::Invalid {
                field,
                message: message.to_string(),
            })
        };
        if !(self.canonical_size > 0.0) {
            return invalid("canonical_size", "must be positive");
        }
        if !(self.framing_margin > 1.0) {
            return invalid("framing_margin", "must be greater than 1");
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return invalid("fov_degrees", "must be between 0 and 180");
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return invalid("far", "clip planes must satisfy 0 < near < far");
        }
        if !(self.min_distance > 0.0 && self.max_distance >= self.min_distance) {
            return invalid("max_distance", "zoom limits must satisfy 0 < min <= max");
        }
        if self.target_fps == 0 {
            return invalid("target_fps", "must be at least 1");
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_fps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.canonical_size, 4.0);
        assert_eq!(config.framing_margin, 1.5);
        assert_eq!(config.frame_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_partial_toml() {
        let config = ViewerConfig::from_toml_str(
            r##"
            canonical_size = 2.0
            base_color = "#ff0000"
            display_mode = "x-ray"
            "##,
        )
        .unwrap();
        assert_eq!(config.canonical_size, 2.0);
        assert_eq!(config.base_color, Color::new(1.0, 0.0, 0.0));
        assert_eq!(config.display_mode, DisplayMode::XRay);
        assert_eq!(config.framing_margin, 1.5);
    }

    #[test]
    fn test_invalid_values() {
        let err = ViewerConfig::from_toml_str("framing_margin = 0.9").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "framing_margin", .. }));

        assert!(ViewerConfig::from_toml_str("base_color = \"blue\"").is_err());
        assert!(ViewerConfig::from_toml_str("unknown_key = 1").is_err());
    }
}
