//! Centralized error types for the observatory roof controller.
//!
//! This crate defines the error taxonomy every public `RoofController`
//! operation returns. No operation panics or throws across a crate
//! boundary; every failure mode is a typed variant here.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the roof controller's public operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoofError {
    /// A command was issued before `initialize` completed successfully.
    #[error("controller is not initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("controller is already initialized")]
    AlreadyInitialized,

    /// A command was issued after `dispose`.
    #[error("controller has been disposed")]
    Disposed,

    /// A command's preconditions were not met (e.g. `open()` with a
    /// fault present).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The HAT port exhausted its retry budget on a relay write or
    /// input read.
    #[error("HAT I/O error: {0}")]
    Io(#[from] HatIoError),

    /// `initialize` observed its cancellation signal before completing.
    #[error("initialize was cancelled")]
    Cancelled,

    /// The supplied configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized `Result` type for roof controller operations.
pub type RoofResult<T> = std::result::Result<T, RoofError>;

/// Errors surfaced by a HAT I/O port implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HatIoError {
    /// A relay identifier was outside the valid `1..=4` range.
    #[error("relay {0} is out of range (expected 1..=4)")]
    InvalidRelay(u8),

    /// An input identifier was outside the valid `1..=4` range.
    #[error("input {0} is out of range (expected 1..=4)")]
    InvalidInput(u8),

    /// A relay write failed after exhausting its retry budget.
    #[error("relay {relay} write failed after {attempts} attempt(s): {reason}")]
    RelayWriteFailed {
        /// The relay that failed to write.
        relay: u8,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Human-readable failure reason from the underlying bus.
        reason: String,
    },

    /// An input read failed.
    #[error("input read failed: {0}")]
    ReadFailed(String),

    /// The port has already been disposed.
    #[error("HAT port has been disposed")]
    Disposed,

    /// The underlying bus reported a transient error; retried
    /// internally and surfaced only for diagnostics.
    #[error("transient bus error (retrying): {0}")]
    Transient(String),
}

impl RoofError {
    /// Build a [`RoofError::PreconditionFailed`] from any displayable reason.
    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionFailed(reason.into())
    }

    /// Build a [`RoofError::InvalidConfig`] from any displayable reason.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

impl HatIoError {
    /// Build a [`HatIoError::RelayWriteFailed`].
    #[must_use]
    pub fn relay_write_failed(relay: u8, attempts: u32, reason: impl Into<String>) -> Self {
        Self::RelayWriteFailed {
            relay,
            attempts,
            reason: reason.into(),
        }
    }
}

/// Context describing a single failed relay write, used by the relay
/// sequencer to report aggregate success/failure without affecting
/// state transitions (see `roof-controller`'s `RelayApplyReport`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayWriteFailure {
    /// The relay that failed to reach its commanded state.
    pub relay: u8,
    /// The error surfaced by the HAT port.
    pub error: HatIoError,
}

/// The bounded total duration a relay retry budget may consume,
/// derived from `max_attempts * delay`.
#[must_use]
pub fn max_retry_duration(max_attempts: u32, delay: Duration) -> Duration {
    delay.saturating_mul(max_attempts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failed_carries_reason() {
        let err = RoofError::precondition("fault present");
        assert_eq!(err.to_string(), "precondition failed: fault present");
    }

    #[test]
    fn io_error_wraps_hat_error() {
        let hat_err = HatIoError::relay_write_failed(1, 3, "bus nack");
        let err: RoofError = hat_err.clone().into();
        assert_eq!(err, RoofError::Io(hat_err));
    }

    #[test]
    fn max_retry_duration_multiplies() {
        let d = max_retry_duration(3, Duration::from_millis(5));
        assert_eq!(d, Duration::from_millis(15));
    }

    #[test]
    fn invalid_relay_message() {
        let err = HatIoError::InvalidRelay(9);
        assert_eq!(err.to_string(), "relay 9 is out of range (expected 1..=4)");
    }
}
