//! Clock-driven rate limiting primitives.
//!
//! Neither primitive owns a timer. Callers pass the current instant in and
//! ask for the next deadline, so the same code runs under a tokio event
//! loop and under deterministic tests.

pub mod debounce;
pub mod throttle;

pub use debounce::Debounce;
pub use throttle::Throttle;
