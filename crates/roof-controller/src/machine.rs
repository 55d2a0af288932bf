//! The core state machine: `RoofController`.
//!
//! Concurrency is realized with a single `tokio::sync::Mutex` guarding
//! `ControllerState`. A `tokio::sync::Mutex` is used in place of a
//! synchronous lock here specifically because every public operation
//! below awaits bounded HAT relay writes *inside* its critical section;
//! holding a synchronous guard across an `.await` would violate this
//! workspace's `clippy::await_holding_lock` lint and is not what the
//! lint exists to catch -- `tokio::sync::Mutex` is built for exactly
//! this. See DESIGN.md for the full rationale.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use roof_errors::{RoofError, RoofResult};
use roof_hal::polarity::{LogicalInputs, PolarityConfig, map_inputs};
use roof_hal::{HatPort, InputEdge};
use roof_watchdog::Watchdog;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ControllerConfig;
use crate::health::build_report;
use crate::publisher::StatusPublisher;
use crate::relay::RelaySequencer;
use crate::types::{CommandIntent, HealthReport, RelayCommand, Status, StatusSnapshot, StopReason};

/// Resolve the externally observable `Status` from the two limit
/// switches, the last commanded direction, and whether the watchdog
/// is still armed.
fn resolve_status(
    open_reached: bool,
    closed_reached: bool,
    last_command: CommandIntent,
    watchdog_active: bool,
) -> Status {
    match (open_reached, closed_reached) {
        (true, false) => Status::Open,
        (false, true) => Status::Closed,
        (true, true) => Status::Error,
        (false, false) => {
            if watchdog_active {
                match last_command {
                    CommandIntent::Open => Status::Opening,
                    CommandIntent::Close => Status::Closing,
                    _ => Status::Stopped,
                }
            } else {
                match last_command {
                    CommandIntent::Open => Status::PartiallyOpen,
                    CommandIntent::Close => Status::PartiallyClose,
                    _ => Status::Stopped,
                }
            }
        }
    }
}

/// Polarity-resolve a single raw input level (the single-bit
/// counterpart of [`map_inputs`], used by the edge handler which only
/// ever observes one changed line at a time).
fn logical_level(input: u8, raw: bool, polarity: PolarityConfig) -> bool {
    if (input == 1 || input == 2) && polarity.use_normally_closed_limits {
        !raw
    } else {
        raw
    }
}

struct ControllerState {
    initialized: bool,
    disposed: bool,
    status: Status,
    last_stop_reason: StopReason,
    last_command: CommandIntent,
    last_transition_utc: chrono::DateTime<Utc>,
    logical: LogicalInputs,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            initialized: false,
            disposed: false,
            status: Status::NotInitialized,
            last_stop_reason: StopReason::None,
            last_command: CommandIntent::NoneYet,
            last_transition_utc: Utc::now(),
            logical: LogicalInputs::default(),
        }
    }

    /// Overwrite `status`, bumping `last_transition_utc` only if the
    /// status actually changed -- the timestamp tracks transitions,
    /// not call attempts, which is what makes two consecutive
    /// `stop()` calls idempotent with respect to it.
    fn set_status(&mut self, status: Status) {
        if self.status != status {
            self.status = status;
            self.last_transition_utc = Utc::now();
        }
    }
}

fn compute_snapshot(
    state: &ControllerState,
    watchdog_active: bool,
    watchdog_remaining: Option<Duration>,
) -> StatusSnapshot {
    StatusSnapshot {
        status: state.status,
        is_moving: state.status.is_moving(),
        last_stop_reason: state.last_stop_reason,
        last_transition_utc: state.last_transition_utc,
        is_watchdog_active: watchdog_active,
        watchdog_seconds_remaining: watchdog_remaining.map(|d| d.as_secs_f64()),
        is_at_speed: state.logical.at_speed,
    }
}

struct Inner {
    hat: Arc<dyn HatPort>,
    config: ControllerConfig,
    sequencer: RelaySequencer,
    state: AsyncMutex<ControllerState>,
    watchdog: Watchdog,
    publisher: StatusPublisher,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    /// Safety watchdog fire handler: unconditional fail-safe stop and transition to
    /// `Error`. Invoked from a task spawned by the watchdog's
    /// callback, never while holding `state`.
    async fn on_watchdog_fire(self: Arc<Self>) {
        warn!("safety watchdog fired while moving; forcing fail-safe stop");
        self.sequencer.apply(RelayCommand::stop_only()).await;
        let mut guard = self.state.lock().await;
        guard.last_stop_reason = StopReason::SafetyWatchdogTimeout;
        guard.set_status(Status::Error);
        let snapshot = compute_snapshot(&guard, false, None);
        drop(guard);
        self.publisher.publish(snapshot);
    }
}

/// The observatory roof's state machine. Cheaply `Clone`
/// (an `Arc` handle); every clone observes the same underlying state.
#[derive(Clone)]
pub struct RoofController(Arc<Inner>);

impl RoofController {
    /// Build a controller bound to `hat`, validating `config` first.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn new(hat: Arc<dyn HatPort>, config: ControllerConfig) -> RoofResult<Self> {
        config.validate()?;
        let sequencer = RelaySequencer::new(Arc::clone(&hat), &config);
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let fire_weak = weak.clone();
            let watchdog = Watchdog::new(Arc::new(move || {
                let weak = fire_weak.clone();
                tokio::spawn(async move {
                    if let Some(inner) = weak.upgrade() {
                        Inner::on_watchdog_fire(inner).await;
                    }
                });
            }));
            Inner {
                hat,
                config,
                sequencer,
                state: AsyncMutex::new(ControllerState::new()),
                watchdog,
                publisher: StatusPublisher::new(32),
                tasks: SyncMutex::new(Vec::new()),
            }
        });
        Ok(Self(inner))
    }

    fn snapshot_locked(&self, state: &ControllerState) -> StatusSnapshot {
        let active = self.0.watchdog.is_active();
        let remaining = active.then(|| self.0.watchdog.remaining());
        compute_snapshot(state, active, remaining)
    }

    /// Current status snapshot, sampled under the state lock.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let guard = self.0.state.lock().await;
        self.snapshot_locked(&guard)
    }

    /// Read-only health/readiness projection. Safe to
    /// call concurrently with any command.
    pub async fn health(&self) -> HealthReport {
        let guard = self.0.state.lock().await;
        let active = self.0.watchdog.is_active();
        let remaining = active.then(|| self.0.watchdog.remaining().as_secs_f64());
        build_report(
            guard.initialized,
            guard.disposed,
            guard.status,
            guard.last_stop_reason,
            active,
            remaining,
        )
    }

    /// Subscribe to every future status snapshot.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.0.publisher.subscribe()
    }

    /// Apply `RelayCommand::stop_only()`, stop the watchdog, re-read
    /// hardware inputs, resolve status, and publish. The shared
    /// fail-safe primitive behind `initialize`, `stop`, `dispose`, and
    /// the emergency-stop prefix of `open`/`close`/`clear_fault`
    ///.
    async fn internal_stop(&self, reason: StopReason) -> RoofResult<StatusSnapshot> {
        self.0.sequencer.apply(RelayCommand::stop_only()).await;
        self.0.watchdog.stop();
        let raw = self.0.hat.read_all_inputs().await?;
        let logical = map_inputs(raw, self.0.config.polarity());

        let mut guard = self.0.state.lock().await;
        guard.logical = logical;
        guard.last_stop_reason = reason;
        let resolved = resolve_status(
            logical.open_limit_reached,
            logical.closed_limit_reached,
            guard.last_command,
            false,
        );
        guard.set_status(resolved);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Re-read hardware inputs and resolve status without forcing a
    /// stop -- used after a clear-fault pulse and by the periodic
    /// verification task's non-edge tick.
    async fn refresh_status(&self) -> RoofResult<StatusSnapshot> {
        let raw = self.0.hat.read_all_inputs().await?;
        let logical = map_inputs(raw, self.0.config.polarity());
        let mut guard = self.0.state.lock().await;
        guard.logical = logical;
        let watchdog_active = self.0.watchdog.is_active();
        let resolved = resolve_status(
            logical.open_limit_reached,
            logical.closed_limit_reached,
            guard.last_command,
            watchdog_active,
        );
        guard.set_status(resolved);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Initialize the controller: subscribe to input edges, perform
    /// an `internal_stop` to reach a known safe state, and register a
    /// background watcher that calls `stop(NormalStop)` if `cancel`
    /// is ever tripped.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::AlreadyInitialized`], [`RoofError::Disposed`],
    /// [`RoofError::Cancelled`] if `cancel` trips before completion, or
    /// the underlying [`RoofError::Io`] error.
    pub async fn initialize(&self, cancel: CancellationToken) -> RoofResult<StatusSnapshot> {
        {
            let guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            if guard.initialized {
                return Err(RoofError::AlreadyInitialized);
            }
        }

        let setup = async {
            if self.0.config.enable_input_polling {
                let rx = self.0.hat.subscribe_edges().await?;
                self.spawn_edge_task(rx);
            }
            self.internal_stop(StopReason::None).await
        };

        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RoofError::Cancelled),
            result = setup => result?,
        };

        {
            let mut guard = self.0.state.lock().await;
            guard.initialized = true;
            guard.last_command = CommandIntent::Initialize;
        }

        self.spawn_cancellation_watcher(cancel);
        if self.0.config.enable_periodic_verification_while_moving {
            self.spawn_periodic_verification_task();
        }

        info!("roof controller initialized");
        Ok(snapshot)
    }

    fn spawn_cancellation_watcher(&self, cancel: CancellationToken) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            info!("initialize cancellation token tripped; stopping");
            let _ = controller.stop(StopReason::NormalStop).await;
        });
        self.0.tasks.lock().push(handle);
    }

    fn spawn_edge_task(&self, mut rx: tokio::sync::mpsc::Receiver<InputEdge>) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(edge) = rx.recv().await {
                controller.handle_edge(edge).await;
            }
        });
        self.0.tasks.lock().push(handle);
    }

    fn spawn_periodic_verification_task(&self) {
        let controller = self.clone();
        let period = self.0.config.periodic_verification_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let (disposed, moving, was_open, was_closed) = {
                    let guard = controller.0.state.lock().await;
                    (
                        guard.disposed,
                        guard.status.is_moving(),
                        guard.logical.open_limit_reached,
                        guard.logical.closed_limit_reached,
                    )
                };
                if disposed {
                    break;
                }
                if !moving {
                    continue;
                }
                let Ok(raw) = controller.0.hat.read_all_inputs().await else {
                    continue;
                };
                let logical = map_inputs(raw, controller.0.config.polarity());
                if logical.open_limit_reached && !was_open {
                    let _ = controller.fail_safe_limit_stop(logical).await;
                } else if logical.closed_limit_reached && !was_closed {
                    let _ = controller.fail_safe_limit_stop(logical).await;
                } else {
                    let mut guard = controller.0.state.lock().await;
                    guard.logical = logical;
                }
            }
        });
        self.0.tasks.lock().push(handle);
    }

    /// Fail-safe stop triggered by a limit switch reaching
    /// logical-true, from either the edge stream or periodic
    /// verification.
    async fn fail_safe_limit_stop(&self, logical: LogicalInputs) -> RoofResult<StatusSnapshot> {
        self.0.watchdog.stop();
        self.0.sequencer.apply(RelayCommand::stop_only()).await;
        let mut guard = self.0.state.lock().await;
        guard.logical = logical;
        guard.last_stop_reason = StopReason::LimitSwitchReached;
        let resolved = resolve_status(
            logical.open_limit_reached,
            logical.closed_limit_reached,
            guard.last_command,
            false,
        );
        guard.set_status(resolved);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Fail-safe stop triggered by the fault line reaching
    /// logical-true: forces `Error` unconditionally.
    async fn fail_safe_fault_stop(&self, logical: LogicalInputs) {
        self.0.watchdog.stop();
        self.0.sequencer.apply(RelayCommand::stop_only()).await;
        let mut guard = self.0.state.lock().await;
        guard.logical = logical;
        guard.last_stop_reason = StopReason::EmergencyStop;
        guard.set_status(Status::Error);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot);
    }

    async fn handle_edge(&self, edge: InputEdge) {
        let polarity = self.0.config.polarity();
        let logical_value = logical_level(edge.input, edge.raw_level, polarity);

        match edge.input {
            1 => {
                let mut logical = self.0.state.lock().await.logical;
                let was = logical.open_limit_reached;
                logical.open_limit_reached = logical_value;
                if logical_value && !was {
                    let _ = self.fail_safe_limit_stop(logical).await;
                } else {
                    self.0.state.lock().await.logical.open_limit_reached = logical_value;
                    let _ = self.refresh_status().await;
                }
            }
            2 => {
                let mut logical = self.0.state.lock().await.logical;
                let was = logical.closed_limit_reached;
                logical.closed_limit_reached = logical_value;
                if logical_value && !was {
                    let _ = self.fail_safe_limit_stop(logical).await;
                } else {
                    self.0.state.lock().await.logical.closed_limit_reached = logical_value;
                    let _ = self.refresh_status().await;
                }
            }
            3 => {
                let mut logical = self.0.state.lock().await.logical;
                let was = logical.fault_present;
                logical.fault_present = logical_value;
                if logical_value && !was {
                    self.fail_safe_fault_stop(logical).await;
                } else {
                    self.0.state.lock().await.logical.fault_present = logical_value;
                }
            }
            4 => {
                let mut guard = self.0.state.lock().await;
                guard.logical.at_speed = logical_value;
            }
            other => {
                warn!(input = other, "ignoring edge on unrecognized input line");
            }
        }
    }

    /// Command motion toward the open limit.
    ///
    /// # Errors
    ///
    /// [`RoofError::Disposed`], [`RoofError::NotInitialized`], or
    /// [`RoofError::PreconditionFailed`] if a fault is present.
    /// Returns the current snapshot as `Ok` (not an error) if the
    /// open limit is already reached.
    pub async fn open(&self) -> RoofResult<StatusSnapshot> {
        {
            let guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            if !guard.initialized {
                return Err(RoofError::NotInitialized);
            }
            if guard.logical.fault_present {
                return Err(RoofError::precondition("fault present"));
            }
            if guard.logical.open_limit_reached && !guard.logical.closed_limit_reached {
                return Ok(self.snapshot_locked(&guard));
            }
        }

        {
            let mut guard = self.0.state.lock().await;
            guard.last_command = CommandIntent::Open;
        }
        // Inhibit the drive first: accepted
        // relay chatter in exchange for a clean electrical transition.
        self.internal_stop(StopReason::NormalStop).await?;

        self.0.sequencer.apply(RelayCommand::open_motion()).await;
        self.0
            .watchdog
            .start(self.0.config.watchdog_timeout)
            .map_err(|_| RoofError::invalid_config("watchdog_timeout must be positive"))?;

        let mut guard = self.0.state.lock().await;
        guard.set_status(Status::Opening);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Command motion toward the closed limit, symmetric
    /// to [`RoofController::open`].
    ///
    /// # Errors
    ///
    /// See [`RoofController::open`].
    pub async fn close(&self) -> RoofResult<StatusSnapshot> {
        {
            let guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            if !guard.initialized {
                return Err(RoofError::NotInitialized);
            }
            if guard.logical.fault_present {
                return Err(RoofError::precondition("fault present"));
            }
            if guard.logical.closed_limit_reached && !guard.logical.open_limit_reached {
                return Ok(self.snapshot_locked(&guard));
            }
        }

        {
            let mut guard = self.0.state.lock().await;
            guard.last_command = CommandIntent::Close;
        }
        self.internal_stop(StopReason::NormalStop).await?;

        self.0.sequencer.apply(RelayCommand::close_motion()).await;
        self.0
            .watchdog
            .start(self.0.config.watchdog_timeout)
            .map_err(|_| RoofError::invalid_config("watchdog_timeout must be positive"))?;

        let mut guard = self.0.state.lock().await;
        guard.set_status(Status::Closing);
        let snapshot = self.snapshot_locked(&guard);
        drop(guard);
        self.0.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Idempotent stop. Preserves the previous command
    /// intent so status resolution can still distinguish
    /// `PartiallyOpen` from `PartiallyClose`.
    ///
    /// # Errors
    ///
    /// [`RoofError::Disposed`] or [`RoofError::NotInitialized`].
    pub async fn stop(&self, reason: StopReason) -> RoofResult<StatusSnapshot> {
        {
            let guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            if !guard.initialized {
                return Err(RoofError::NotInitialized);
            }
        }
        self.internal_stop(reason).await
    }

    /// Emergency-stop, then pulse the clear-fault relay low/high/low,
    /// holding high for `pulse_ms`, then re-resolve status. The core
    /// always executes the pulse when initialized; gating on
    /// `status == Error` is left to the API boundary.
    ///
    /// # Errors
    ///
    /// [`RoofError::Disposed`] or [`RoofError::NotInitialized`].
    pub async fn clear_fault(&self, pulse_ms: u64) -> RoofResult<StatusSnapshot> {
        {
            let guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            if !guard.initialized {
                return Err(RoofError::NotInitialized);
            }
        }

        self.internal_stop(StopReason::EmergencyStop).await?;

        self.0
            .sequencer
            .apply(RelayCommand::clear_fault_pulse(false))
            .await;
        self.0
            .sequencer
            .apply(RelayCommand::clear_fault_pulse(true))
            .await;
        tokio::time::sleep(Duration::from_millis(pulse_ms)).await;
        self.0
            .sequencer
            .apply(RelayCommand::clear_fault_pulse(false))
            .await;

        self.refresh_status().await
    }

    /// Idempotent disposal. Performs a final fail-safe
    /// stop, aborts background tasks, releases the HAT bus, and marks
    /// the controller terminal; every subsequent command returns
    /// [`RoofError::Disposed`].
    ///
    /// # Errors
    ///
    /// [`RoofError::Disposed`] if already disposed.
    pub async fn dispose(&self) -> RoofResult<StatusSnapshot> {
        {
            let mut guard = self.0.state.lock().await;
            if guard.disposed {
                return Err(RoofError::Disposed);
            }
            guard.disposed = true;
        }

        let snapshot = self.internal_stop(StopReason::SystemDisposal).await?;

        for handle in self.0.tasks.lock().drain(..) {
            handle.abort();
        }
        self.0.hat.dispose().await;

        info!("roof controller disposed");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_status_table() {
        assert_eq!(
            resolve_status(true, false, CommandIntent::Open, false),
            Status::Open
        );
        assert_eq!(
            resolve_status(false, true, CommandIntent::Close, false),
            Status::Closed
        );
        assert_eq!(
            resolve_status(true, true, CommandIntent::NoneYet, false),
            Status::Error
        );
        assert_eq!(
            resolve_status(false, false, CommandIntent::Open, true),
            Status::Opening
        );
        assert_eq!(
            resolve_status(false, false, CommandIntent::Close, true),
            Status::Closing
        );
        assert_eq!(
            resolve_status(false, false, CommandIntent::Open, false),
            Status::PartiallyOpen
        );
        assert_eq!(
            resolve_status(false, false, CommandIntent::Close, false),
            Status::PartiallyClose
        );
        assert_eq!(
            resolve_status(false, false, CommandIntent::NoneYet, false),
            Status::Stopped
        );
    }

    #[test]
    fn logical_level_respects_polarity_for_limits_only() {
        let nc = PolarityConfig {
            use_normally_closed_limits: true,
        };
        let no = PolarityConfig {
            use_normally_closed_limits: false,
        };
        assert!(logical_level(1, false, nc));
        assert!(!logical_level(1, false, no));
        // Fault/at-speed are fixed polarity regardless of config.
        assert!(logical_level(3, true, nc));
        assert!(logical_level(3, true, no));
    }
}
