//! In-memory HAT simulator used by tests and by the default
//! (non-`hardware`) build of `roofd`.
//!
//! A plain `parking_lot`-guarded struct that lets tests drive raw input
//! levels and inject bus failures, while recording every relay write
//! for assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use roof_errors::HatIoError;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::warn;

use crate::{HatPort, InputEdge, InputId, RelayId, validate_line};

/// A scripted failure the simulator will return for the next matching
/// relay write, then clear.
#[derive(Debug, Clone)]
enum ScriptedFailure {
    /// Fails the next `max(1, attempts - 1)` attempts transiently, then
    /// succeeds -- exercises the HAT's internal retry path.
    TransientThenSucceed { remaining_failures: u32 },
    /// Fails every attempt permanently.
    Permanent,
}

struct SimState {
    relays: [bool; 4],
    raw_inputs: [bool; 4],
    disposed: bool,
    relay_failures: [Option<ScriptedFailure>; 4],
    write_history: VecDeque<(RelayId, bool)>,
    edge_txs: Vec<mpsc::Sender<InputEdge>>,
}

/// In-memory [`HatPort`] implementation.
pub struct SimulatedHat {
    state: Arc<Mutex<SimState>>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl SimulatedHat {
    /// Create a simulator with all relays de-energized and all raw
    /// inputs low.
    #[must_use]
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                relays: [false; 4],
                raw_inputs: [false; 4],
                disposed: false,
                relay_failures: [None, None, None, None],
                write_history: VecDeque::new(),
                edge_txs: Vec::new(),
            })),
            max_attempts,
            retry_delay,
        }
    }

    /// Drive a raw input line to a new level, notifying any edge
    /// subscribers if the level actually changed.
    pub fn set_raw_input(&self, input: InputId, raw_level: bool) {
        assert!(validate_line(input), "input id out of range");
        let idx = usize::from(input - 1);
        let mut state = self.state.lock();
        let Some(level) = state.raw_inputs.get_mut(idx) else {
            return;
        };
        if *level == raw_level {
            return;
        }
        *level = raw_level;
        let edge = InputEdge { input, raw_level };
        state.edge_txs.retain(|tx| tx.try_send(edge).is_ok());
    }

    /// Current raw level of one input line.
    #[must_use]
    pub fn raw_input(&self, input: InputId) -> bool {
        self.state.lock().raw_inputs.get(usize::from(input - 1)).copied().unwrap_or(false)
    }

    /// Current energized state of one relay.
    #[must_use]
    pub fn relay_state(&self, relay: RelayId) -> bool {
        self.state.lock().relays.get(usize::from(relay - 1)).copied().unwrap_or(false)
    }

    /// Snapshot of every relay write ever applied, in order, for test
    /// assertions about write ordering and mutual exclusion.
    #[must_use]
    pub fn write_history(&self) -> Vec<(RelayId, bool)> {
        self.state.lock().write_history.iter().copied().collect()
    }

    /// Script the next write to `relay` to transiently fail
    /// `failures` times before succeeding.
    pub fn fail_next_writes_transiently(&self, relay: RelayId, failures: u32) {
        let mut state = self.state.lock();
        if let Some(slot) = state.relay_failures.get_mut(usize::from(relay - 1)) {
            *slot = Some(ScriptedFailure::TransientThenSucceed { remaining_failures: failures });
        }
    }

    /// Script every future write to `relay` to fail permanently until
    /// cleared.
    pub fn fail_writes_permanently(&self, relay: RelayId) {
        let mut state = self.state.lock();
        if let Some(slot) = state.relay_failures.get_mut(usize::from(relay - 1)) {
            *slot = Some(ScriptedFailure::Permanent);
        }
    }

    /// Clear any scripted failure for `relay`.
    pub fn clear_failure(&self, relay: RelayId) {
        let mut state = self.state.lock();
        if let Some(slot) = state.relay_failures.get_mut(usize::from(relay - 1)) {
            *slot = None;
        }
    }

    fn attempt_write(&self, relay: RelayId, on: bool) -> Result<(), HatIoError> {
        let idx = usize::from(relay - 1);
        let mut state = self.state.lock();
        if state.disposed {
            return Err(HatIoError::Disposed);
        }
        let slot = state.relay_failures.get_mut(idx).ok_or(HatIoError::InvalidRelay(relay))?;
        match slot {
            Some(ScriptedFailure::Permanent) => {
                return Err(HatIoError::Transient("scripted permanent failure".into()));
            }
            Some(ScriptedFailure::TransientThenSucceed { remaining_failures }) if *remaining_failures > 0 => {
                *remaining_failures -= 1;
                return Err(HatIoError::Transient("scripted transient failure".into()));
            }
            Some(ScriptedFailure::TransientThenSucceed { .. }) => {
                *slot = None;
            }
            None => {}
        }
        let relay_slot = state.relays.get_mut(idx).ok_or(HatIoError::InvalidRelay(relay))?;
        *relay_slot = on;
        state.write_history.push_back((relay, on));
        Ok(())
    }
}

#[async_trait]
impl HatPort for SimulatedHat {
    async fn try_set_relay(&self, id: RelayId, on: bool) -> Result<(), HatIoError> {
        if !validate_line(id) {
            return Err(HatIoError::InvalidRelay(id));
        }
        let mut last_err = None;
        for attempt in 1..=self.max_attempts.max(1) {
            match self.attempt_write(id, on) {
                Ok(()) => return Ok(()),
                Err(HatIoError::Disposed) => return Err(HatIoError::Disposed),
                Err(err) => {
                    warn!(relay = id, attempt, %err, "relay write attempt failed");
                    last_err = Some(err);
                    if attempt < self.max_attempts {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(HatIoError::relay_write_failed(
            id,
            self.max_attempts,
            last_err.map_or_else(|| "unknown".to_string(), |e| e.to_string()),
        ))
    }

    async fn read_all_inputs(&self) -> Result<[bool; 4], HatIoError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(HatIoError::Disposed);
        }
        Ok(state.raw_inputs)
    }

    async fn subscribe_edges(&self) -> Result<mpsc::Receiver<InputEdge>, HatIoError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(HatIoError::Disposed);
        }
        let (tx, rx) = mpsc::channel(32);
        state.edge_txs.push(tx);
        Ok(rx)
    }

    async fn dispose(&self) {
        let mut state = self.state.lock();
        state.disposed = true;
        state.edge_txs.clear();
    }
}
