//! Rune Motion configuration system
//!
//! This crate provides centralized configuration for the motion runtime,
//! loading settings from `rune-motion.toml` with environment variable
//! overrides layered on top.

mod error;

pub use error::{ConfigError, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default file name looked up by [`MotionConfig::load_or_default`].
pub const CONFIG_FILE_NAME: &str = "rune-motion.toml";

/// Main configuration structure for Rune Motion
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MotionConfig {
    /// Value animation settings
    pub animation: AnimationConfig,
    /// Layout projection settings
    pub projection: ProjectionConfig,
}

/// Value animation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Force transform animations to snap, regardless of element settings
    pub reduced_motion: bool,
    /// Tween duration used when a transition does not set one
    pub default_duration_ms: f32,
    /// Tween easing used when a transition does not set one
    /// (linear, ease, ease_in, ease_out, ease_in_out)
    pub default_easing: String,
    /// Spring physics defaults
    pub spring: SpringConfig,
}

/// Spring physics defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    /// Distance from the target under which the spring may settle
    pub rest_delta: f64,
    /// Speed (units/s) under which the spring may settle
    pub rest_speed: f64,
}

/// Layout projection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Frame time after the last resize before layout updates resume
    pub resize_unblock_delay_ms: f64,
    /// Crossfade shared elements on promotion instead of hiding the old lead
    pub crossfade: bool,
    /// Start a layout animation when a node's layout changes
    pub animate_layout: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            reduced_motion: false,
            default_duration_ms: 300.0,
            default_easing: "ease".to_string(),
            spring: SpringConfig::default(),
        }
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            damping: 10.0,
            mass: 1.0,
            rest_delta: 0.01,
            rest_speed: 0.01,
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            resize_unblock_delay_ms: 250.0,
            crossfade: true,
            animate_layout: true,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl MotionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from `rune-motion.toml` in the current directory,
    /// or return the defaults if it is missing or invalid
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE_NAME).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        self.merge_with_vars(|name| std::env::var(name).ok());
    }

    /// Merge overrides from an arbitrary variable source.
    pub fn merge_with_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("RUNE_MOTION_REDUCED_MOTION") {
            self.animation.reduced_motion = parse_flag(&val);
        }
        if let Some(val) = lookup("RUNE_MOTION_DURATION_MS") {
            if let Ok(duration) = val.parse::<f32>() {
                self.animation.default_duration_ms = duration;
            }
        }
        if let Some(val) = lookup("RUNE_MOTION_RESIZE_DELAY_MS") {
            if let Ok(delay) = val.parse::<f64>() {
                self.projection.resize_unblock_delay_ms = delay;
            }
        }
        if let Some(val) = lookup("RUNE_MOTION_CROSSFADE") {
            self.projection.crossfade = parse_flag(&val);
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from rune-motion.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert!(!config.animation.reduced_motion);
        assert_eq!(config.animation.default_duration_ms, 300.0);
        assert_eq!(config.animation.spring.stiffness, 100.0);
        assert_eq!(config.projection.resize_unblock_delay_ms, 250.0);
        assert!(config.projection.crossfade);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[animation]\nreduced_motion = true\n\n[animation.spring]\ndamping = 20.0"
        )
        .unwrap();

        let config = MotionConfig::load_from_file(file.path()).unwrap();
        assert!(config.animation.reduced_motion);
        assert_eq!(config.animation.spring.damping, 20.0);
        assert_eq!(config.animation.spring.stiffness, 100.0);
        assert!(config.projection.animate_layout);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MotionConfig::load_from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[projection]\ncrossfade = \"sometimes\"").unwrap();

        let err = MotionConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_var_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RUNE_MOTION_REDUCED_MOTION", "1"),
            ("RUNE_MOTION_DURATION_MS", "120"),
            ("RUNE_MOTION_RESIZE_DELAY_MS", "not-a-number"),
            ("RUNE_MOTION_CROSSFADE", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = MotionConfig::default();
        config.merge_with_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert!(config.animation.reduced_motion);
        assert_eq!(config.animation.default_duration_ms, 120.0);
        assert_eq!(config.projection.resize_unblock_delay_ms, 250.0);
        assert!(!config.projection.crossfade);
    }

    #[test]
    fn test_toml_serialization() {
        let config = MotionConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: MotionConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.animation.default_easing, "ease");
    }
}
