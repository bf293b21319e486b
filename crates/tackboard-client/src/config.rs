//! Client configuration, loaded from RON.
//!
//! ```ron
//! (
//!     endpoint: "board.example.org:5000",
//!     credential: Some("s3cret"),
//!     elevated_secret: Some("s3cret"),
//!     user_name: Some("Kai"),
//!     placement: free_drag,
//!     viewport_width: 1024.0,
//!     reconnect: (max_attempts: 8, base_delay_ms: 500, max_delay_ms: 20000),
//! )
//! ```
//!
//! Every field is optional and falls back to the defaults in `constants`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::actor::{ConnectOptions, ReconnectPolicy};
use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY,
    DEFAULT_RECONNECT_MAX_DELAY, DEFAULT_VIEWPORT_WIDTH,
};
use crate::layout::{LayoutEngine, PlacementMode};
use crate::session::{ElevationPolicy, SessionContext};

/// Error type for config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backoff settings in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_RECONNECT_MAX_DELAY.as_millis() as u64,
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        ReconnectPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Everything needed to start a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Connect-time credential offered for elevation.
    pub credential: Option<String>,
    /// Secret a credential must match to elevate. `None` disables elevation.
    pub elevated_secret: Option<String>,
    pub user_name: Option<String>,
    pub placement: PlacementMode,
    pub viewport_width: f64,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: None,
            elevated_secret: None,
            user_name: None,
            placement: PlacementMode::default(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        info!(path = %path.display(), endpoint = %config.endpoint, "config loaded");
        Ok(config)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is empty".into()));
        }
        if !self.viewport_width.is_finite() || self.viewport_width < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "viewport_width must be a non-negative number, got {}",
                self.viewport_width
            )));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect base delay {}ms exceeds max delay {}ms",
                self.reconnect.base_delay_ms, self.reconnect.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn elevation_policy(&self) -> ElevationPolicy {
        ElevationPolicy::new(self.elevated_secret.clone())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(self.endpoint.clone())
            .with_credential(self.credential.as_deref(), &self.elevation_policy())
            .with_reconnect(ReconnectPolicy::from(&self.reconnect))
    }

    /// Session context matching [`connect_options`](Self::connect_options).
    pub fn session(&self) -> SessionContext {
        SessionContext::new(self.connect_options().is_elevated(), self.user_name.clone())
    }

    pub fn layout(&self) -> LayoutEngine {
        LayoutEngine::new(self.placement, self.viewport_width)
    }
}
