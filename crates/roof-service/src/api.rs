//! HTTP/SSE surface for the roof controller: an `axum` `Router` over
//! shared `State<RoofController>` handlers, covering status, health,
//! the four motion/fault commands, and a server-sent-events status
//! stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use roof_controller::{RoofController, StopReason};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::error::ApiError;

/// Build the `roofd` router bound to `controller`.
#[must_use]
pub fn router(controller: RoofController) -> Router {
    Router::new()
        .route("/v1/status", get(status))
        .route("/v1/health", get(health))
        .route("/v1/open", post(open))
        .route("/v1/close", post(close))
        .route("/v1/stop", post(stop))
        .route("/v1/clear-fault", post(clear_fault))
        .route("/v1/status/stream", get(status_stream))
        .with_state(controller)
}

async fn status(State(controller): State<RoofController>) -> impl IntoResponse {
    Json(controller.snapshot().await)
}

async fn health(State(controller): State<RoofController>) -> impl IntoResponse {
    Json(controller.health().await)
}

async fn open(State(controller): State<RoofController>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(controller.open().await?))
}

async fn close(State(controller): State<RoofController>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(controller.close().await?))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StopRequest {
    reason: Option<StopReason>,
}

async fn stop(
    State(controller): State<RoofController>,
    body: Option<Json<StopRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or(StopReason::NormalStop);
    Ok(Json(controller.stop(reason).await?))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ClearFaultRequest {
    pulse_ms: u64,
}

impl Default for ClearFaultRequest {
    fn default() -> Self {
        Self { pulse_ms: 250 }
    }
}

async fn clear_fault(
    State(controller): State<RoofController>,
    body: Option<Json<ClearFaultRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let pulse_ms = body.map(|Json(req)| req.pulse_ms).unwrap_or(250);
    Ok(Json(controller.clear_fault(pulse_ms).await?))
}

async fn status_stream(
    State(controller): State<RoofController>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(controller.subscribe()).filter_map(|item| match item {
        Ok(snapshot) => match Event::default().json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!(%err, "failed to encode status snapshot as SSE event");
                None
            }
        },
        Err(err) => {
            warn!(%err, "status stream subscriber lagged; snapshots were dropped");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
