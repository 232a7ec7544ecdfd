//! Viewer configuration.
//!
//! Every section has defaults, so a configuration file only needs the values
//! it changes. Values are layered: defaults, then an optional TOML file, then
//! environment variables.

use crate::animation::AnimationConfig;
use crate::gesture::GestureConfig;
use crate::scale::ScalePolicy;
use docview_cache::{PoolConfig, PoolConfigError};
use docview_scheduler::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Tile edge length in pixels, for both dimensions
pub const ENV_TILE_SIZE: &str = "DOCVIEW_TILE_SIZE";
/// Thumbnail scale in (0, 1]
pub const ENV_THUMBNAIL_SCALE: &str = "DOCVIEW_THUMBNAIL_SCALE";
/// `true`/`false` or `1`/`0`
pub const ENV_BEST_QUALITY: &str = "DOCVIEW_BEST_QUALITY";
/// Full width page margin in view pixels
pub const ENV_PAGE_MARGIN: &str = "DOCVIEW_PAGE_MARGIN";

/// Layout section
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub scale_policy: ScalePolicy,
}

/// Render worker section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Default: `docview-render-worker`
    pub thread_name: String,
    /// Default: 100
    pub poll_interval_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        let config = WorkerConfig::default();
        Self {
            thread_name: config.thread_name,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
        }
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub tiles: PoolConfig,
    pub layout: LayoutConfig,
    pub animation: AnimationConfig,
    pub gestures: GestureConfig,
    pub worker: WorkerSection,
}

impl ViewerConfig {
    /// Sets the tile size.
    pub fn with_tile_size(mut self, size: u32) -> Self {
        self.tiles.tile_width = size;
        self.tiles.tile_height = size;
        self
    }

    /// Sets the scale policy.
    pub fn with_scale_policy(mut self, policy: ScalePolicy) -> Self {
        self.layout.scale_policy = policy;
        self
    }

    /// Sets the animation duration.
    pub fn with_animation_duration(mut self, duration: Duration) -> Self {
        self.animation.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Loads defaults overridden by environment variables.
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Loads a TOML file, then applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from `DOCVIEW_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(size) = env_value::<u32>(ENV_TILE_SIZE)? {
            self.tiles.tile_width = size;
            self.tiles.tile_height = size;
        }

        if let Some(scale) = env_value::<f32>(ENV_THUMBNAIL_SCALE)? {
            self.tiles.thumbnail_scale = scale;
        }

        if let Ok(val) = std::env::var(ENV_BEST_QUALITY) {
            self.tiles.best_quality = match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::InvalidValue(ENV_BEST_QUALITY.to_string())),
            };
        }

        if let Some(margin) = env_value::<i32>(ENV_PAGE_MARGIN)? {
            match &mut self.layout.scale_policy {
                ScalePolicy::FitWidth { full_width_margin } => *full_width_margin = margin,
                ScalePolicy::Fixed { page_margin, .. } => *page_margin = margin,
            }
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Converts configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every section holds usable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiles.validate()?;

        match self.layout.scale_policy {
            ScalePolicy::FitWidth { full_width_margin } if full_width_margin < 0 => {
                return Err(ConfigError::Invalid(format!(
                    "full width margin must not be negative, got {full_width_margin}"
                )));
            }
            ScalePolicy::Fixed {
                initial,
                min,
                mid,
                max,
                page_margin,
            } => {
                let ordered = min > 0.0 && min <= mid && mid <= max && (min..=max).contains(&initial);
                if !ordered || page_margin < 0 {
                    return Err(ConfigError::Invalid(format!(
                        "fixed scales must satisfy 0 < min <= initial, mid <= max, got \
                         min {min}, initial {initial}, mid {mid}, max {max}"
                    )));
                }
            }
            ScalePolicy::FitWidth { .. } => {}
        }

        let decay = self.animation.fling_decay;
        if !(decay > 0.0 && decay < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fling decay must be in (0, 1), got {decay}"
            )));
        }
        if self.gestures.touch_slop < 0.0 || self.gestures.min_fling_velocity < 0.0 {
            return Err(ConfigError::Invalid(
                "gesture thresholds must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        self.tiles
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_thread_name(self.worker.thread_name.clone())
            .with_poll_interval(Duration::from_millis(self.worker.poll_interval_ms))
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Pool(#[from] PoolConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
