//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default frame rate for segments and the final output.
pub const DEFAULT_FRAME_RATE: u32 = 24;

/// Default libx264 constant rate factor.
pub const DEFAULT_QUALITY: u8 = 23;

/// Highest constant rate factor libx264 accepts.
pub const MAX_QUALITY: u8 = 51;

/// Default file suffix used for staged frames.
pub const DEFAULT_IMAGE_SUFFIX: &str = "jpg";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default stitch settings, overridden by CLI flags.
    pub stitch: StitchDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default stitch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchDefaults {
    /// Frames per second for every segment and the final output.
    pub frame_rate: u32,

    /// Extension given to staged frames.
    pub image_suffix: String,

    /// Constant rate factor (0-51, lower is higher quality).
    pub quality: u8,

    /// Number of batches encoded concurrently.
    pub workers: usize,

    /// Directory the staging root is created in (system temp dir if unset).
    pub staging_parent: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framestitch_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for StitchDefaults {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            image_suffix: DEFAULT_IMAGE_SUFFIX.to_string(),
            quality: DEFAULT_QUALITY,
            workers: 1,
            staging_parent: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framestitch").join("config.json")
}
