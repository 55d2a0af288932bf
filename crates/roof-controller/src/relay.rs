//! Atomic multi-relay sequencing.

use std::sync::Arc;

use roof_errors::RelayWriteFailure;
use roof_hal::HatPort;
use tracing::warn;

use crate::config::ControllerConfig;
use crate::types::RelayCommand;

/// Aggregate result of applying a [`RelayCommand`] across all four
/// physical lines. Used only for logging/diagnostics -- the state
/// machine's correctness depends on the *intended* electrical state
/// under the fail-safe rules, not on whether every line converged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayApplyReport {
    /// Lines that failed to reach their commanded state after
    /// exhausting the HAT port's retry budget.
    pub failures: Vec<RelayWriteFailure>,
}

impl RelayApplyReport {
    /// `true` iff every relay write in this report succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes relays in the fixed order (stop, open, close, clear_fault),
/// using the HAT port's retrying setter for each line. A failure on
/// one line does not short-circuit the remaining writes.
#[derive(Debug, Clone)]
pub struct RelaySequencer {
    hat: Arc<dyn HatPort>,
    open_relay_id: u8,
    close_relay_id: u8,
    clear_fault_relay_id: u8,
    stop_relay_id: u8,
}

impl RelaySequencer {
    /// Build a sequencer bound to `hat` using the relay channel
    /// mapping from `config`.
    #[must_use]
    pub fn new(hat: Arc<dyn HatPort>, config: &ControllerConfig) -> Self {
        Self {
            hat,
            open_relay_id: config.open_relay_id,
            close_relay_id: config.close_relay_id,
            clear_fault_relay_id: config.clear_fault_relay_id,
            stop_relay_id: config.stop_relay_id,
        }
    }

    /// Apply `cmd` to hardware, writing stop, open, close, then
    /// clear_fault in that fixed order.
    pub async fn apply(&self, cmd: RelayCommand) -> RelayApplyReport {
        let mut report = RelayApplyReport::default();

        for (relay, on) in [
            (self.stop_relay_id, cmd.stop),
            (self.open_relay_id, cmd.open),
            (self.close_relay_id, cmd.close),
            (self.clear_fault_relay_id, cmd.clear_fault),
        ] {
            if let Err(error) = self.hat.try_set_relay(relay, on).await {
                warn!(relay, on, %error, "relay write did not converge");
                report.failures.push(RelayWriteFailure { relay, error });
            }
        }

        report
    }
}
