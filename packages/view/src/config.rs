//! Map view configuration.
//!
//! The defaults are embedded from `config/default.toml` at compile time. A
//! user file with the same layout replaces them, and the
//! `MAP_ACCESS_TOKEN` / `REALTY_API_BASE_URL` environment variables take
//! precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use realty_map_camera::CameraConfig;
use realty_map_geometry::SyntheticShape;
use serde::{Deserialize, Serialize};

/// Embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable holding the rendering-surface credential.
pub const ACCESS_TOKEN_VAR: &str = "MAP_ACCESS_TOKEN";

/// Environment variable overriding [`MapConfig::api_base_url`].
pub const API_BASE_URL_VAR: &str = "REALTY_API_BASE_URL";

/// Errors that prevent the map view from mounting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The rendering surface cannot start without a credential.
    #[error("No access token configured (set {ACCESS_TOKEN_VAR} or access_token)")]
    MissingAccessToken,

    /// The user config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config text is not valid TOML for [`MapConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Playback settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Period between playback ticks.
    pub interval_ms: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { interval_ms: 1200 }
    }
}

impl TimelineConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Everything the map view needs at mount time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Rendering-surface credential. Required to mount.
    pub access_token: Option<String>,
    /// Root of the REST API serving overrides and the timeline.
    pub api_base_url: String,
    /// Maximum compare set size.
    pub compare_capacity: usize,
    /// Source name of the polygon collection.
    pub area_source: String,
    /// Source name of the label point collection.
    pub label_source: String,
    pub geometry: SyntheticShape,
    pub timeline: TimelineConfig,
    pub camera: CameraConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: "http://localhost:3001/api".to_string(),
            compare_capacity: 4,
            area_source: "areas".to_string(),
            label_source: "areas-points".to_string(),
            geometry: SyntheticShape::default(),
            timeline: TimelineConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl MapConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// * [`ConfigurationError::Parse`] if the text is not valid TOML
    pub fn from_toml(text: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::de::from_str(text)?)
    }

    /// The embedded defaults.
    ///
    /// # Errors
    ///
    /// * [`ConfigurationError::Parse`] if the embedded file is malformed
    pub fn embedded() -> Result<Self, ConfigurationError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Loads `path` (or the embedded defaults) and applies the process
    /// environment.
    ///
    /// # Errors
    ///
    /// * [`ConfigurationError::Read`] if `path` cannot be read
    /// * [`ConfigurationError::Parse`] if the TOML is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let config = match path {
            Some(path) => {
                log::info!("Loading map config from {}", path.display());
                let text =
                    std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::from_toml(&text)?
            }
            None => Self::embedded()?,
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Applies environment overrides using `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(ACCESS_TOKEN_VAR).filter(|token| !token.is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(url) = lookup(API_BASE_URL_VAR).filter(|url| !url.is_empty()) {
            log::debug!("API base URL overridden to {url}");
            self.api_base_url = url;
        }
        self
    }

    /// Checks the values the view cannot run without.
    ///
    /// # Errors
    ///
    /// * [`ConfigurationError::MissingAccessToken`] if no credential is set
    /// * [`ConfigurationError::Invalid`] for out-of-range values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self
            .access_token
            .as_deref()
            .is_none_or(|token| token.trim().is_empty())
        {
            return Err(ConfigurationError::MissingAccessToken);
        }
        if self.compare_capacity < 2 {
            return Err(ConfigurationError::Invalid {
                key: "compare_capacity".to_string(),
                message: format!("must be at least 2, got {}", self.compare_capacity),
            });
        }
        if self.timeline.interval_ms == 0 {
            return Err(ConfigurationError::Invalid {
                key: "timeline.interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.area_source == self.label_source {
            return Err(ConfigurationError::Invalid {
                key: "label_source".to_string(),
                message: format!("must differ from area_source ({})", self.area_source),
            });
        }
        Ok(())
    }
}
