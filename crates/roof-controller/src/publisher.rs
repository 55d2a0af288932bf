//! Status snapshot publication to external subscribers.

use std::panic::AssertUnwindSafe;

use tokio::sync::broadcast;
use tracing::warn;

use crate::types::StatusSnapshot;

/// Broadcasts immutable [`StatusSnapshot`]s to any number of
/// subscribers on every externally-visible transition.
///
/// Backed by a single `tokio::sync::broadcast` channel: snapshots are
/// small, `Clone`, and delivery is fire-and-forget, so there is no need
/// for per-client connection bookkeeping. A subscriber that never
/// drains its receiver simply lags and misses older snapshots (standard
/// `broadcast` semantics) rather than blocking the publisher -- each
/// subscriber owns its own receiver and processes snapshots one at a
/// time, so delivery to one subscriber is never blocked by another.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    sender: broadcast::Sender<StatusSnapshot>,
}

impl StatusPublisher {
    /// Create a publisher with room for `capacity` un-drained
    /// snapshots per subscriber before it starts lagging.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future snapshots. Subscriptions survive until the
    /// receiver is dropped or the controller is disposed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.sender.subscribe()
    }

    /// Deliver `snapshot` to every current subscriber. Never panics:
    /// `send` only fails when there are no subscribers, which is not
    /// an error condition here.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        // A future subscriber callback model (vs. today's plain channel
        // receive) could panic mid-delivery; isolate that from affecting
        // the publish path or other subscribers.
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = self.sender.send(snapshot);
        }));
        if result.is_err() {
            warn!("status snapshot delivery panicked; isolated from controller");
        }
    }

    /// Current subscriber count, for diagnostics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
