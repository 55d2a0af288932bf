//! Cross-cutting invariants verified against the full state machine:
//! motion-exclusion, fail-safe holds, watchdog arming, and status
//! resolution. Related invariants live in `roof-watchdog` (restart
//! behavior), `roof-hal::polarity` (polarity symmetry), and alongside
//! the scenarios in `scenarios.rs` (stop idempotency).

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use roof_controller::{ControllerConfig, RoofController, Status};
use roof_hal::sim::SimulatedHat;
use tokio_util::sync::CancellationToken;

async fn initialized() -> (RoofController, Arc<SimulatedHat>) {
    let hat = Arc::new(SimulatedHat::new(3, Duration::from_millis(1)));
    hat.set_raw_input(1, true);
    hat.set_raw_input(2, true);
    let controller =
        RoofController::new(Arc::clone(&hat) as Arc<dyn roof_hal::HatPort>, ControllerConfig::default())
            .unwrap();
    controller.initialize(CancellationToken::new()).await.unwrap();
    (controller, hat)
}

#[tokio::test]
async fn mutual_exclusion_of_motion_relays_holds_through_a_full_cycle() {
    let (controller, hat) = initialized().await;
    controller.open().await.unwrap();
    controller.stop(roof_controller::StopReason::NormalStop).await.unwrap();
    controller.close().await.unwrap();
    controller.dispose().await.unwrap();

    let mut open_on = false;
    let mut close_on = false;
    for (relay, on) in hat.write_history() {
        match relay {
            1 => open_on = on,
            2 => close_on = on,
            _ => {}
        }
        assert!(!(open_on && close_on), "open and close energized simultaneously");
    }
}

#[tokio::test]
async fn fail_safe_hold_whenever_not_moving() {
    let (controller, hat) = initialized().await;
    let snapshot = controller.open().await.unwrap();
    assert!(snapshot.status.is_moving());

    controller.stop(roof_controller::StopReason::NormalStop).await.unwrap();
    let snapshot = controller.snapshot().await;
    assert!(!snapshot.status.is_moving());
    assert!(hat.relay_state(4), "stop relay must hold once not moving");
    assert!(!hat.relay_state(1));
    assert!(!hat.relay_state(2));
}

#[tokio::test]
async fn snapshot_immutability_across_a_transition() {
    let (controller, _hat) = initialized().await;
    let before = controller.snapshot().await;
    assert_eq!(before.status, Status::Stopped);

    let after = controller.open().await.unwrap();
    assert_eq!(before.status, Status::Stopped, "captured snapshot is not mutated");
    assert_eq!(after.status, Status::Opening);
}

#[tokio::test]
async fn subscriber_receives_every_transition_in_order() {
    let (controller, hat) = initialized().await;
    let mut rx = controller.subscribe();

    controller.open().await.unwrap();
    hat.set_raw_input(1, false);
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    let mut statuses = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        statuses.push(snapshot.status);
    }
    assert!(statuses.contains(&Status::Opening));
    assert!(statuses.contains(&Status::Open));
}
