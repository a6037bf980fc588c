//! Panel configuration.
//!
//! Values come from `PanelConfig::default()`, optionally overridden by the
//! `MEDIAPANEL_QUIET_MS` and `MEDIAPANEL_VIEWPORT_PX` environment variables,
//! and are validated by `PanelConfigBuilder::build`.

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;
use crate::models::MediaKind;

/// Batch debounce/throttle interval used by the web UI.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 100;

/// Fallback viewport height when the embedder has not reported one yet.
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 900.0;

/// Default memory budget for resolved blobs.
pub const DEFAULT_BLOB_CACHE_MB: usize = 128;

const QUIET_ENV: &str = "MEDIAPANEL_QUIET_MS";
const VIEWPORT_ENV: &str = "MEDIAPANEL_VIEWPORT_PX";

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    /// Quiet period for the batch debounce, also the throttle interval.
    pub quiet_period: Duration,
    /// Scroll distance beyond which the in-flight batch is aborted.
    pub viewport_height: f64,
    /// Memory budget for the blob cache in megabytes.
    pub blob_cache_mb: usize,
    /// Which kind of media this panel shows.
    pub media_kind: MediaKind,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            blob_cache_mb: DEFAULT_BLOB_CACHE_MB,
            media_kind: MediaKind::Image,
        }
    }
}

impl PanelConfig {
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::new()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        PanelConfigBuilder::new().with_env()?.build()
    }
}

/// Builder for `PanelConfig` with validation.
#[derive(Debug, Clone)]
pub struct PanelConfigBuilder {
    config: PanelConfig,
}

impl PanelConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PanelConfig::default(),
        }
    }

    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.config.quiet_period = period;
        self
    }

    pub fn viewport_height(mut self, height: f64) -> Self {
        self.config.viewport_height = height;
        self
    }

    pub fn blob_cache_mb(mut self, mb: usize) -> Self {
        self.config.blob_cache_mb = mb;
        self
    }

    pub fn media_kind(mut self, kind: MediaKind) -> Self {
        self.config.media_kind = kind;
        self
    }

    /// Apply `MEDIAPANEL_QUIET_MS` and `MEDIAPANEL_VIEWPORT_PX` if set.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|name| env::var(name).ok())
    }

    fn with_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(QUIET_ENV) {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: QUIET_ENV,
                    value: value.clone(),
                })?;
            debug!(ms, "Quiet period overridden from environment");
            self.config.quiet_period = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(VIEWPORT_ENV) {
            let px = value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: VIEWPORT_ENV,
                    value: value.clone(),
                })?;
            debug!(px, "Viewport height overridden from environment");
            self.config.viewport_height = px;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<PanelConfig, ConfigError> {
        let config = self.config;
        if config.quiet_period.is_zero() {
            return Err(ConfigError::ZeroQuietPeriod(config.quiet_period));
        }
        if !config.viewport_height.is_finite() || config.viewport_height <= 0.0 {
            return Err(ConfigError::InvalidViewportHeight(config.viewport_height));
        }
        Ok(config)
    }
}

impl Default for PanelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
