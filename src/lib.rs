//! Interaction core of a lazily loaded media panel.
//!
//! - `fetch` - Batched, cancellable blob requests and the resolved-blob cache
//! - `hover` - Active point tracking for the hover overlay
//! - `panel` - Lifecycle wiring and the tokio event loop

pub mod config;
pub mod error;
pub mod fetch;
pub mod hover;
pub mod models;
pub mod panel;
pub mod timing;

pub use config::PanelConfig;
pub use error::{ConfigError, FetchError};
