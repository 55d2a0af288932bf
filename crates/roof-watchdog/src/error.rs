//! Error type for the safety watchdog.

use thiserror::Error;

/// Errors a [`crate::Watchdog`] can return.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchdogError {
    /// `start` was called with a non-positive timeout.
    #[error("watchdog timeout must be greater than zero")]
    InvalidTimeout,
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = std::result::Result<T, WatchdogError>;
