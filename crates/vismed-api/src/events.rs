// Event relay HTTP routes (SSE)
//
// POST /v1/events/send accepts payloads from the upstream automation flow;
// GET /v1/events/stream pushes them to browser clients as SSE frames.
// Delivery is best-effort: no acknowledgment, no persistence across restart.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use utoipa::ToSchema;
use vismed_core::{EventRelay, PublishOutcome};

// ============================================
// App State and Routes
// ============================================

/// App state for relay routes
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<EventRelay>,
}

impl AppState {
    pub fn new(relay: Arc<EventRelay>) -> Self {
        Self { relay }
    }
}

/// Create relay routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events/send", post(publish_event))
        .route("/v1/events/stream", get(stream_events))
        .with_state(state)
}

// ============================================
// Response Types
// ============================================

/// Acknowledgment returned for every non-malformed publish.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Always true: the relay is fire-and-forget, not guaranteed delivery.
    pub success: bool,
    /// Echo of the payload as received. Absent for skipped duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
    /// Set to "duplicate" when a buffered payload already carries the same
    /// signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Error body for rejected publishes.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================
// HTTP Handlers
// ============================================

/// POST /v1/events/send - Accept one event payload from the upstream producer
///
/// The body is arbitrary JSON; no schema is enforced beyond the optional
/// `output` field. A missing or unparseable body is rejected without
/// buffering or broadcasting anything.
#[utoipa::path(
    post,
    path = "/v1/events/send",
    request_body(content = serde_json::Value, description = "Arbitrary event payload"),
    responses(
        (status = 200, description = "Payload delivered, buffered, or skipped as duplicate", body = PublishResponse),
        (status = 400, description = "Missing or malformed body", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn publish_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, (StatusCode, Json<ErrorResponse>)> {
    // An unparseable body is treated the same as no body at all.
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let outcome = state.relay.publish(payload.clone()).map_err(|e| {
        tracing::warn!("rejected publish: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let response = match outcome {
        PublishOutcome::Delivered(subscribers) => {
            tracing::info!(subscribers, "payload broadcast");
            PublishResponse {
                success: true,
                received: Some(payload),
                skipped: None,
            }
        }
        PublishOutcome::Buffered => {
            tracing::info!(pending = state.relay.pending_len(), "payload buffered");
            PublishResponse {
                success: true,
                received: Some(payload),
                skipped: None,
            }
        }
        PublishOutcome::SkippedDuplicate => PublishResponse {
            success: true,
            received: None,
            skipped: Some("duplicate".to_string()),
        },
    };

    Ok(Json(response))
}

/// GET /v1/events/stream - Stream relayed events (SSE)
///
/// Replays any buffered payloads first, then the synthetic
/// `{"status":"connected","id":<id>}` frame, then every payload published
/// while the connection stays open. Closing the connection deregisters the
/// subscriber.
#[utoipa::path(
    get,
    path = "/v1/events/stream",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream")
    ),
    tag = "events"
)]
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.relay.subscribe();
    tracing::info!(subscriber_id = subscription.id(), "starting event stream");

    let stream = subscription.map(|payload| {
        let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
