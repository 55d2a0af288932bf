//! HAT I/O port abstraction consumed by the roof controller core.
//!
//! A HAT ("hardware attached on top") exposes four relay outputs and
//! four opto-isolated digital inputs over I²C. This crate defines the
//! minimal capability set the core state machine relies on
//! (`try_set_relay`, `read_all_inputs`, edge notification, `dispose`)
//! and ships two implementations: an in-memory [`sim::SimulatedHat`]
//! for tests, and a real Raspberry Pi backend behind the `hardware`
//! feature.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod polarity;
pub mod sim;

#[cfg(feature = "hardware")]
pub mod rpi;

use async_trait::async_trait;
use roof_errors::HatIoError;

/// A single relay line, numbered 1..=4.
pub type RelayId = u8;
/// A single digital input line, numbered 1..=4.
pub type InputId = u8;

/// Validate that a relay or input identifier falls in the HAT's
/// physical `1..=4` range.
fn validate_line(id: u8) -> bool {
    (1..=4).contains(&id)
}

/// A raw level change observed on one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge {
    /// The input line that changed (1..=4).
    pub input: InputId,
    /// The new raw electrical level.
    pub raw_level: bool,
}

/// The minimal capability set a HAT implementation must provide.
///
/// Implementations retry transient I/O internally; only a permanent
/// failure crosses this boundary as an `Err`. After [`HatPort::dispose`]
/// every call returns [`HatIoError::Disposed`].
#[async_trait]
pub trait HatPort: Send + Sync {
    /// Set one relay's energized state, retrying transient bus errors
    /// internally up to the port's configured attempt budget.
    ///
    /// On success the relay's electrical state matches `on` (verified
    /// by read-back when the hardware supports it).
    async fn try_set_relay(&self, id: RelayId, on: bool) -> Result<(), HatIoError>;

    /// Read the raw electrical level of all four inputs in line order.
    async fn read_all_inputs(&self) -> Result<[bool; 4], HatIoError>;

    /// Subscribe to edge notifications. Returns a channel that yields
    /// an [`InputEdge`] whenever a raw level change is detected.
    /// Implementations may poll at a configured interval; callers must
    /// not assume hardware interrupts.
    async fn subscribe_edges(&self) -> Result<tokio::sync::mpsc::Receiver<InputEdge>, HatIoError>;

    /// Release the bus and unsubscribe pollers. Idempotent; after this
    /// call every other method returns [`HatIoError::Disposed`].
    async fn dispose(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_line_range() {
        assert!(validate_line(1));
        assert!(validate_line(4));
        assert!(!validate_line(0));
        assert!(!validate_line(5));
    }
}
