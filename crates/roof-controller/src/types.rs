//! Core data model: `Status`, `StopReason`, `CommandIntent`,
//! `RelayCommand`, and the `StatusSnapshot`/`HealthReport` projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The roof's externally observable motion state. Exactly one value
/// at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    /// `initialize` has not yet completed successfully.
    NotInitialized,
    /// Initialized but the limit switches do not yet agree on a
    /// known end-of-travel position (transient, pre-first-resolve).
    Unknown,
    /// Motion commanded toward the open limit.
    Opening,
    /// Motion commanded toward the closed limit.
    Closing,
    /// The open-limit switch is engaged.
    Open,
    /// The closed-limit switch is engaged.
    Closed,
    /// Stopped between limits while the last commanded motion was
    /// `Open`.
    PartiallyOpen,
    /// Stopped between limits while the last commanded motion was
    /// `Close`.
    PartiallyClose,
    /// Stopped between limits with no prior directional intent.
    Stopped,
    /// A hardware contradiction, drive fault, or safety timeout was
    /// observed.
    Error,
}

impl Default for Status {
    fn default() -> Self {
        Self::NotInitialized
    }
}

/// Why the roof most recently stopped (or `None` if it never has).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StopReason {
    /// No stop has occurred yet.
    None,
    /// An operator-requested stop.
    NormalStop,
    /// A limit switch was reached.
    LimitSwitchReached,
    /// The drive reported a fault.
    EmergencyStop,
    /// A physical stop button was pressed (surfaced the same as
    /// `NormalStop` electrically, tracked separately for diagnostics).
    StopButtonPressed,
    /// The safety watchdog fired.
    SafetyWatchdogTimeout,
    /// The controller was disposed while moving.
    SystemDisposal,
}

impl Default for StopReason {
    fn default() -> Self {
        Self::None
    }
}

/// The most recent operator/automatic directive, used to disambiguate
/// partial states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CommandIntent {
    /// No command has been issued yet.
    NoneYet,
    /// `initialize` ran.
    Initialize,
    /// `open()` ran.
    Open,
    /// `close()` ran.
    Close,
    /// `stop()` ran with no directional intent preserved.
    Stop,
    /// A limit-switch edge forced a stop.
    LimitStop,
    /// A fault or watchdog timeout forced a stop.
    SafetyStop,
}

impl Default for CommandIntent {
    fn default() -> Self {
        Self::NoneYet
    }
}

/// Logical (polarity-resolved) view of the four digital inputs,
/// re-exported here for snapshot composition.
pub use roof_hal::polarity::LogicalInputs;

/// The four relay outputs, invariants enforced by construction:
/// - never both `open` and `close`;
/// - `stop == true` for every non-motion command;
/// - exactly one of `open`/`close` during motion, with `stop == false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCommand {
    /// Stop/enable-inhibit relay. Energized holds the drive inhibited.
    pub stop: bool,
    /// Open (forward) motion relay.
    pub open: bool,
    /// Close (reverse) motion relay.
    pub close: bool,
    /// Clear-fault relay, pulsed during fault recovery.
    pub clear_fault: bool,
}

impl RelayCommand {
    /// Fail-safe hold: stop asserted, no motion, fault line low.
    #[must_use]
    pub fn stop_only() -> Self {
        Self {
            stop: true,
            open: false,
            close: false,
            clear_fault: false,
        }
    }

    /// Command motion toward the open limit.
    #[must_use]
    pub fn open_motion() -> Self {
        Self {
            stop: false,
            open: true,
            close: false,
            clear_fault: false,
        }
    }

    /// Command motion toward the closed limit.
    #[must_use]
    pub fn close_motion() -> Self {
        Self {
            stop: false,
            open: false,
            close: true,
            clear_fault: false,
        }
    }

    /// Stop asserted (fail-safe hold) with the clear-fault line held
    /// at `clear_fault_high` -- used mid-pulse during fault recovery.
    #[must_use]
    pub fn clear_fault_pulse(clear_fault_high: bool) -> Self {
        Self {
            stop: true,
            open: false,
            close: false,
            clear_fault: clear_fault_high,
        }
    }

    /// True iff this command violates the mutual-exclusion invariant:
    /// both `open` and `close` asserted at once. Used by tests and
    /// defensively by the sequencer; every constructor above is
    /// exclusion-safe by construction, so this should never observe
    /// `true` in practice.
    #[must_use]
    pub fn violates_motion_exclusion(&self) -> bool {
        self.open && self.close
    }

    /// True iff this command satisfies the fail-safe hold invariant
    /// for a non-motion status: `stop` asserted and no motion relay.
    #[must_use]
    pub fn is_fail_safe_hold(&self) -> bool {
        self.stop && !self.open && !self.close
    }
}

impl Default for RelayCommand {
    fn default() -> Self {
        Self::stop_only()
    }
}

/// Immutable status record delivered to subscribers and returned from
/// every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current motion status.
    pub status: Status,
    /// `true` iff `status` is `Opening` or `Closing`.
    pub is_moving: bool,
    /// Why the roof most recently stopped.
    pub last_stop_reason: StopReason,
    /// UTC timestamp of the most recent transition.
    pub last_transition_utc: DateTime<Utc>,
    /// Whether the safety watchdog is currently armed.
    pub is_watchdog_active: bool,
    /// Seconds remaining before the watchdog fires, if armed.
    pub watchdog_seconds_remaining: Option<f64>,
    /// Drive-reported at-speed telemetry (informational only).
    pub is_at_speed: bool,
}

/// Read-only projection for external readiness/liveness probes.
/// Evolves independently of `StatusSnapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether `initialize` has completed successfully.
    pub is_initialized: bool,
    /// Whether `dispose` has been called.
    pub is_disposed: bool,
    /// Current motion status.
    pub status: Status,
    /// Why the roof most recently stopped.
    pub last_stop_reason: StopReason,
    /// `true` iff `status` is `Opening` or `Closing`.
    pub is_moving: bool,
    /// Whether the safety watchdog is currently armed.
    pub is_watchdog_active: bool,
    /// Seconds remaining before the watchdog fires, if armed.
    pub watchdog_seconds_remaining: Option<f64>,
    /// `true` iff initialized, not disposed, and `status != Error`.
    pub ready: bool,
    /// UTC timestamp this report was sampled.
    pub sampled_at_utc: DateTime<Utc>,
}

impl Status {
    /// `true` iff this status represents active motion.
    #[must_use]
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }
}
