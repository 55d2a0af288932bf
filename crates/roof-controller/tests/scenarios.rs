//! End-to-end motion/fault/recovery scenarios and the cross-cutting
//! invariants that are easier to verify against the full state machine
//! than in isolation.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use roof_controller::{ControllerConfig, RoofController, Status, StopReason};
use roof_hal::sim::SimulatedHat;
use tokio_util::sync::CancellationToken;

/// Build a controller over a fresh simulator with both limit switches
/// released (raw HIGH under the default normally-closed wiring, so
/// neither logical limit is reached) and initialize it.
async fn initialized(config: ControllerConfig) -> (RoofController, Arc<SimulatedHat>) {
    let hat = Arc::new(SimulatedHat::new(3, Duration::from_millis(1)));
    hat.set_raw_input(1, true);
    hat.set_raw_input(2, true);
    let controller =
        RoofController::new(Arc::clone(&hat) as Arc<dyn roof_hal::HatPort>, config).unwrap();
    let snapshot = controller.initialize(CancellationToken::new()).await.unwrap();
    assert_eq!(snapshot.status, Status::Stopped);
    (controller, hat)
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn normal_open_cycle_reaches_open_and_disarms_watchdog() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;

    let snapshot = controller.open().await.unwrap();
    assert_eq!(snapshot.status, Status::Opening);
    assert!(snapshot.is_watchdog_active);

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    // Raw LOW on input 1 is logical-true under default NC wiring.
    hat.set_raw_input(1, false);
    settle().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, Status::Open);
    assert_eq!(snapshot.last_stop_reason, StopReason::LimitSwitchReached);
    assert!(!snapshot.is_watchdog_active);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_open_then_close_resumes_motion() {
    let (controller, _hat) = initialized(ControllerConfig::default()).await;

    controller.open().await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;

    let snapshot = controller.stop(StopReason::NormalStop).await.unwrap();
    assert_eq!(snapshot.status, Status::PartiallyOpen);
    assert_eq!(snapshot.last_stop_reason, StopReason::NormalStop);
    assert!(!snapshot.is_watchdog_active);

    let snapshot = controller.close().await.unwrap();
    assert_eq!(snapshot.status, Status::Closing);
}

#[tokio::test(start_paused = true)]
async fn watchdog_timeout_then_clear_fault_allows_recovery() {
    let mut config = ControllerConfig::default();
    config.watchdog_timeout = Duration::from_secs(1);
    let (controller, hat) = initialized(config).await;

    controller.open().await.unwrap();
    tokio::time::advance(Duration::from_millis(1100)).await;
    settle().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, Status::Error);
    assert_eq!(snapshot.last_stop_reason, StopReason::SafetyWatchdogTimeout);

    // Fault input stays logical-false throughout.
    assert!(!hat.raw_input(3));
    controller.clear_fault(250).await.unwrap();
    settle().await;

    let snapshot = controller.open().await.unwrap();
    assert_eq!(snapshot.status, Status::Opening);
    assert!(snapshot.is_watchdog_active);
}

#[tokio::test(start_paused = true)]
async fn both_limits_reached_simultaneously_is_error() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;

    hat.set_raw_input(1, false);
    settle().await;
    hat.set_raw_input(2, false);
    settle().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, Status::Error);
}

#[tokio::test(start_paused = true)]
async fn fault_line_during_motion_forces_emergency_stop() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;

    controller.open().await.unwrap();
    hat.set_raw_input(3, true);
    settle().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, Status::Error);
    assert_eq!(snapshot.last_stop_reason, StopReason::EmergencyStop);
    assert!(hat.relay_state(4)); // stop relay energized
    assert!(!hat.relay_state(1)); // open relay de-energized
    assert!(!hat.relay_state(2)); // close relay de-energized
}

#[tokio::test(start_paused = true)]
async fn dispose_during_motion_stops_and_rejects_further_commands() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;

    controller.close().await.unwrap();
    let snapshot = controller.dispose().await.unwrap();
    assert_eq!(snapshot.last_stop_reason, StopReason::SystemDisposal);
    assert!(hat.relay_state(4));

    let err = controller.open().await.unwrap_err();
    assert_eq!(err, roof_errors::RoofError::Disposed);
    let err = controller.stop(StopReason::NormalStop).await.unwrap_err();
    assert_eq!(err, roof_errors::RoofError::Disposed);
}

#[tokio::test(start_paused = true)]
async fn watchdog_armed_iff_moving() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.is_watchdog_active, snapshot.status.is_moving());

    let snapshot = controller.open().await.unwrap();
    assert_eq!(snapshot.is_watchdog_active, snapshot.status.is_moving());
    assert!(snapshot.is_watchdog_active);

    hat.set_raw_input(1, false);
    settle().await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.is_watchdog_active, snapshot.status.is_moving());
    assert!(!snapshot.is_watchdog_active);
}

#[tokio::test(start_paused = true)]
async fn idempotent_stop_leaves_state_unchanged() {
    let (controller, _hat) = initialized(ControllerConfig::default()).await;

    controller.open().await.unwrap();
    let first = controller.stop(StopReason::NormalStop).await.unwrap();
    let second = controller.stop(StopReason::NormalStop).await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.last_stop_reason, second.last_stop_reason);
    assert_eq!(first.is_watchdog_active, second.is_watchdog_active);
    assert_eq!(first.last_transition_utc, second.last_transition_utc);
}

#[tokio::test(start_paused = true)]
async fn already_open_returns_current_status_not_an_error() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;
    controller.open().await.unwrap();
    hat.set_raw_input(1, false);
    settle().await;

    let snapshot = controller.open().await.unwrap();
    assert_eq!(snapshot.status, Status::Open);
}

#[tokio::test(start_paused = true)]
async fn fault_present_blocks_open() {
    let (controller, hat) = initialized(ControllerConfig::default()).await;
    hat.set_raw_input(3, true);
    settle().await;

    let err = controller.open().await.unwrap_err();
    assert!(matches!(err, roof_errors::RoofError::PreconditionFailed(_)));
}

#[tokio::test]
async fn double_initialize_is_rejected() {
    let (controller, _hat) = initialized(ControllerConfig::default()).await;
    let err = controller
        .initialize(CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, roof_errors::RoofError::AlreadyInitialized);
}

#[tokio::test]
async fn commands_before_initialize_are_rejected() {
    let hat = Arc::new(SimulatedHat::new(3, Duration::from_millis(1)));
    let controller =
        RoofController::new(hat as Arc<dyn roof_hal::HatPort>, ControllerConfig::default())
            .unwrap();
    let err = controller.open().await.unwrap_err();
    assert_eq!(err, roof_errors::RoofError::NotInitialized);
}

#[tokio::test(start_paused = true)]
async fn cancellation_token_triggers_stop() {
    let (controller, _hat) = initialized(ControllerConfig::default()).await;
    let token = CancellationToken::new();
    // Re-initialize is rejected, so exercise the cancellation watcher
    // by constructing a second controller with its own token.
    let hat2 = Arc::new(SimulatedHat::new(3, Duration::from_millis(1)));
    hat2.set_raw_input(1, true);
    hat2.set_raw_input(2, true);
    let controller2 =
        RoofController::new(Arc::clone(&hat2) as Arc<dyn roof_hal::HatPort>, ControllerConfig::default())
            .unwrap();
    controller2.initialize(token.clone()).await.unwrap();
    controller2.open().await.unwrap();

    token.cancel();
    settle().await;

    let snapshot = controller2.snapshot().await;
    assert_eq!(snapshot.status, Status::PartiallyOpen);
    assert_eq!(snapshot.last_stop_reason, StopReason::NormalStop);

    // keep the first controller alive for the duration of the test
    let _ = controller.snapshot().await;
}
