//! Controller configuration, loading, and validation.

use std::time::Duration;

use roof_errors::RoofError;
use roof_hal::polarity::PolarityConfig;
use serde::{Deserialize, Serialize};

/// Configuration recognized by the roof controller.
///
/// Every invariant below is enforced by [`ControllerConfig::validate`],
/// called once at construction by `RoofController::new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Maximum continuous motion before an automatic fail-safe stop
    /// and transition to `Error`.
    pub watchdog_timeout: Duration,
    /// Polarity of the two limit-switch inputs.
    pub use_normally_closed_limits: bool,
    /// Whether the edge-notification stream is enabled.
    pub enable_input_polling: bool,
    /// Edge-poll cadence (meaningful only to poll-based `HatPort`
    /// implementations; the HAL owns actually honoring it).
    pub poll_interval: Duration,
    /// Whether to perform direct `read_all_inputs` polls while moving,
    /// to catch missed edges.
    pub enable_periodic_verification_while_moving: bool,
    /// Cadence of the periodic verification reads above.
    pub periodic_verification_interval: Duration,
    /// Physical relay channel (1..=4) wired to the open (forward)
    /// contactor.
    pub open_relay_id: u8,
    /// Physical relay channel wired to the close (reverse) contactor.
    pub close_relay_id: u8,
    /// Physical relay channel wired to the clear-fault contactor.
    pub clear_fault_relay_id: u8,
    /// Physical relay channel wired to the stop/enable-inhibit
    /// contactor.
    pub stop_relay_id: u8,
    /// Retry attempts per relay write before a `HatPort` surfaces an
    /// `IoError`.
    pub max_relay_retry_attempts: u32,
    /// Delay between relay write retry attempts.
    pub relay_retry_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout: Duration::from_secs(90),
            use_normally_closed_limits: true,
            enable_input_polling: true,
            poll_interval: Duration::from_millis(25),
            enable_periodic_verification_while_moving: true,
            periodic_verification_interval: Duration::from_secs(1),
            open_relay_id: 1,
            close_relay_id: 2,
            clear_fault_relay_id: 3,
            stop_relay_id: 4,
            max_relay_retry_attempts: 3,
            relay_retry_delay: Duration::from_millis(5),
        }
    }
}

impl ControllerConfig {
    /// The polarity configuration implied by `use_normally_closed_limits`.
    #[must_use]
    pub fn polarity(&self) -> PolarityConfig {
        PolarityConfig {
            use_normally_closed_limits: self.use_normally_closed_limits,
        }
    }

    /// Validate every configuration invariant:
    /// - relay IDs are distinct and within `1..=4`;
    /// - `watchdog_timeout` and both intervals are strictly positive;
    /// - `periodic_verification_interval <= watchdog_timeout`;
    /// - `enable_periodic_verification_while_moving` requires
    ///   `enable_input_polling`.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::InvalidConfig`] on the first rule violated.
    pub fn validate(&self) -> Result<(), RoofError> {
        let ids = [
            self.open_relay_id,
            self.close_relay_id,
            self.clear_fault_relay_id,
            self.stop_relay_id,
        ];
        for id in ids {
            if !(1..=4).contains(&id) {
                return Err(RoofError::invalid_config(format!(
                    "relay id {id} out of range (expected 1..=4)"
                )));
            }
        }
        let mut sorted = ids;
        sorted.sort_unstable();
        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(RoofError::invalid_config(
                "relay ids must be distinct",
            ));
        }

        if self.watchdog_timeout.is_zero() {
            return Err(RoofError::invalid_config(
                "watchdog_timeout must be positive",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(RoofError::invalid_config(
                "poll_interval must be positive",
            ));
        }
        if self.periodic_verification_interval.is_zero() {
            return Err(RoofError::invalid_config(
                "periodic_verification_interval must be positive",
            ));
        }
        if self.periodic_verification_interval > self.watchdog_timeout {
            return Err(RoofError::invalid_config(
                "periodic_verification_interval must not exceed watchdog_timeout",
            ));
        }
        if self.enable_periodic_verification_while_moving && !self.enable_input_polling {
            return Err(RoofError::invalid_config(
                "enable_periodic_verification_while_moving requires enable_input_polling",
            ));
        }
        if self.max_relay_retry_attempts == 0 {
            return Err(RoofError::invalid_config(
                "max_relay_retry_attempts must be positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        ControllerConfig::default().validate().unwrap();
    }

    #[test]
    fn duplicate_relay_ids_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.close_relay_id = cfg.open_relay_id;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_relay_id_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.stop_relay_id = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_watchdog_timeout_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.watchdog_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn verification_interval_exceeding_watchdog_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.periodic_verification_interval = cfg.watchdog_timeout + Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn periodic_verification_requires_input_polling() {
        let mut cfg = ControllerConfig::default();
        cfg.enable_input_polling = false;
        cfg.enable_periodic_verification_while_moving = true;
        assert!(cfg.validate().is_err());
    }
}
