//! One-shot, restartable safety watchdog.
//!
//! Guards continuous roof motion: the state machine arms the watchdog
//! whenever it commands `Opening`/`Closing` and disarms it on every
//! stop path. If motion runs longer than the configured timeout the
//! watchdog fires its registered callback exactly once.
//!
//! Built around `tokio::time` as a single-shot deadline timer rather
//! than a periodic heartbeat: one `start` arms one deadline, and a
//! generation counter invalidates any timer fire that is stale by the
//! time it would run.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub use error::{WatchdogError, WatchdogResult};

/// Callback invoked exactly once when an armed watchdog's timeout
/// elapses without an intervening [`Watchdog::stop`].
pub type FireCallback = Arc<dyn Fn() + Send + Sync>;

struct Armed {
    /// Bumped on every `start`; a scheduled fire checks its captured
    /// generation against this value and is a no-op if they differ,
    /// which is what makes restart-after-fire and `stop()`-from-inside-
    /// the-callback safe without cancelling the sleeping task.
    generation: u64,
    operation_start: Instant,
    timeout: Duration,
}

struct State {
    generation: u64,
    armed: Option<Armed>,
}

/// A one-shot, restartable deadline timer.
pub struct Watchdog {
    state: Arc<Mutex<State>>,
    on_fire: FireCallback,
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Watchdog")
            .field("armed", &state.armed.is_some())
            .finish_non_exhaustive()
    }
}

impl Watchdog {
    /// Create a disarmed watchdog that invokes `on_fire` on timeout.
    #[must_use]
    pub fn new(on_fire: FireCallback) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                generation: 0,
                armed: None,
            })),
            on_fire,
        }
    }

    /// Arm (or re-arm) the watchdog for `timeout`.
    ///
    /// If already armed, the previous arming is invalidated and a
    /// fresh timeout always applies -- a stale fire scheduled before
    /// this call can never invoke the callback.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::InvalidTimeout`] if `timeout` is zero.
    pub fn start(&self, timeout: Duration) -> WatchdogResult<()> {
        if timeout.is_zero() {
            return Err(WatchdogError::InvalidTimeout);
        }

        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.armed = Some(Armed {
                generation: state.generation,
                operation_start: Instant::now(),
                timeout,
            });
            state.generation
        };

        let state = Arc::clone(&self.state);
        let on_fire = Arc::clone(&self.on_fire);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let fired = {
                let mut guard = state.lock();
                match &guard.armed {
                    Some(armed) if armed.generation == generation => {
                        guard.armed = None;
                        true
                    }
                    _ => false,
                }
            };
            if fired {
                debug!(generation, "watchdog fired");
                on_fire();
            }
        });

        Ok(())
    }

    /// Cancel a pending fire. Idempotent; a no-op if not armed,
    /// including when called from within the fire callback itself.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.armed = None;
    }

    /// Whether the watchdog is currently armed and has not yet fired
    /// or been stopped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().armed.is_some()
    }

    /// Time remaining before the current arming fires, or
    /// [`Duration::ZERO`] if not armed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let state = self.state.lock();
        match &state.armed {
            Some(armed) => {
                let elapsed = armed.operation_start.elapsed();
                armed.timeout.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_timeout() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_cb = Arc::clone(&fired);
        let wd = Watchdog::new(Arc::new(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }));

        wd.start(Duration::from_millis(50)).unwrap();
        assert!(wd.is_active());

        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!wd.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_fire() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_cb = Arc::clone(&fired);
        let wd = Watchdog::new(Arc::new(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }));

        wd.start(Duration::from_millis(50)).unwrap();
        wd.stop();
        assert!(!wd.is_active());

        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_fire_yields_fresh_timeout() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_cb = Arc::clone(&fired);
        let wd = Watchdog::new(Arc::new(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }));

        wd.start(Duration::from_millis(30)).unwrap();
        tokio::time::advance(Duration::from_millis(40)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!wd.is_active());

        wd.start(Duration::from_millis(30)).unwrap();
        assert!(wd.is_active());
        tokio::time::advance(Duration::from_millis(40)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_before_fire_invalidates_stale_timer() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_cb = Arc::clone(&fired);
        let wd = Watchdog::new(Arc::new(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }));

        wd.start(Duration::from_millis(20)).unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        wd.start(Duration::from_millis(20)).unwrap();

        // The first arming's deadline passes; it must not fire because
        // it was superseded.
        tokio::time::advance(Duration::from_millis(15)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(wd.is_active());

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let wd = Watchdog::new(Arc::new(|| {}));
        assert_eq!(wd.start(Duration::ZERO), Err(WatchdogError::InvalidTimeout));
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let wd = Watchdog::new(Arc::new(|| {}));
        assert_eq!(wd.remaining(), Duration::ZERO);
        wd.start(Duration::from_secs(10)).unwrap();
        let remaining = wd.remaining();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining > Duration::from_secs(9));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let wd = Watchdog::new(Arc::new(|| {}));
        wd.stop();
        wd.stop();
        assert!(!wd.is_active());
    }
}
