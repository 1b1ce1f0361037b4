//! Engine configuration (cadence.toml)
//!
//! Every section is optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [tempo]
//! fps = 120
//!
//! [path]
//! curve_length_generation_steps = 8
//! lookup_table_precision = 2.0
//!
//! [physics]
//! velocity_epsilon = 0.01
//!
//! [motion]
//! default_additive_weighting = 1.0
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub path: PathConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

/// Clock cadence
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TempoConfig {
    /// Beats per second delivered by `TimerTempo`
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_fps() -> u32 {
    60
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

impl TempoConfig {
    /// Seconds between two beats
    pub fn interval(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

/// Path sampling
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PathConfig {
    /// Samples per curve segment when approximating arc length
    #[serde(default = "default_curve_steps")]
    pub curve_length_generation_steps: usize,
    /// Lookup table entries per unit of path length
    #[serde(default = "default_lookup_precision")]
    pub lookup_table_precision: f64,
}

fn default_curve_steps() -> usize {
    5
}

fn default_lookup_precision() -> f64 {
    2.0
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            curve_length_generation_steps: default_curve_steps(),
            lookup_table_precision: default_lookup_precision(),
        }
    }
}

/// Physics integration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PhysicsConfig {
    /// Speed below which a physics motion is considered at rest
    #[serde(default = "default_velocity_epsilon")]
    pub velocity_epsilon: f64,
}

fn default_velocity_epsilon() -> f64 {
    0.01
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            velocity_epsilon: default_velocity_epsilon(),
        }
    }
}

/// Tween defaults
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MotionConfig {
    #[serde(default = "default_weighting")]
    pub default_additive_weighting: f64,
}

fn default_weighting() -> f64 {
    1.0
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            default_additive_weighting: default_weighting(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, or from `cadence.toml` inside a directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_path = if path.is_dir() {
            path.join("cadence.toml")
        } else {
            path.to_path_buf()
        };

        let content = fs::read_to_string(&config_path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %config_path.display(), "loaded engine config");
        Ok(config)
    }

    /// Check that every tunable is inside its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tempo.fps == 0 {
            return Err(ConfigError::Invalid("tempo.fps must be positive".into()));
        }
        if self.path.curve_length_generation_steps == 0 {
            return Err(ConfigError::Invalid(
                "path.curve_length_generation_steps must be positive".into(),
            ));
        }
        if self.path.lookup_table_precision.is_nan() || self.path.lookup_table_precision <= 0.0 {
            return Err(ConfigError::Invalid(
                "path.lookup_table_precision must be positive".into(),
            ));
        }
        if self.physics.velocity_epsilon.is_nan() || self.physics.velocity_epsilon <= 0.0 {
            return Err(ConfigError::Invalid(
                "physics.velocity_epsilon must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.motion.default_additive_weighting) {
            return Err(ConfigError::Invalid(
                "motion.default_additive_weighting must be within 0..=1".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
