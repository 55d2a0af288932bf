//! Read-only health/readiness projection.

use chrono::Utc;

use crate::types::{HealthReport, Status, StopReason};

/// Build a [`HealthReport`] from the raw fields the state machine
/// tracks. A pure function over an already-sampled snapshot of state,
/// never itself taking a lock.
#[must_use]
pub fn build_report(
    is_initialized: bool,
    is_disposed: bool,
    status: Status,
    last_stop_reason: StopReason,
    is_watchdog_active: bool,
    watchdog_seconds_remaining: Option<f64>,
) -> HealthReport {
    let ready = is_initialized && !is_disposed && status != Status::Error;
    HealthReport {
        is_initialized,
        is_disposed,
        status,
        last_stop_reason,
        is_moving: status.is_moving(),
        is_watchdog_active,
        watchdog_seconds_remaining,
        ready,
        sampled_at_utc: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_initialized_not_disposed_not_error() {
        let ready = build_report(true, false, Status::Stopped, StopReason::None, false, None);
        assert!(ready.ready);

        let not_init = build_report(false, false, Status::Stopped, StopReason::None, false, None);
        assert!(!not_init.ready);

        let disposed = build_report(true, true, Status::Stopped, StopReason::None, false, None);
        assert!(!disposed.ready);

        let errored = build_report(true, false, Status::Error, StopReason::EmergencyStop, false, None);
        assert!(!errored.ready);
    }

    #[test]
    fn is_moving_mirrors_status() {
        let report = build_report(
            true,
            false,
            Status::Opening,
            StopReason::None,
            true,
            Some(42.0),
        );
        assert!(report.is_moving);
    }
}
