use std::time::Duration;

use thiserror::Error;

/// Failure of a batch blob fetch.
///
/// Aborts are not failures and never produce one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("blob batch request failed: {0}")]
    Transport(String),
    #[error("blob fetch task panicked")]
    TaskPanicked,
}

/// Rejected panel configuration values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("quiet period must be greater than zero, got {0:?}")]
    ZeroQuietPeriod(Duration),
    #[error("viewport height must be positive, got {0}")]
    InvalidViewportHeight(f64),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}
