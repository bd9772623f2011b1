//! HTTP request handlers for the RPC API.

use super::state::RpcState;
use super::types::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use racecontrol_core::Event;
use racecontrol_types::{delay_is_allowed, SessionId, ALLOWED_BROADCAST_DELAYS_MS};

// ═══════════════════════════════════════════════════════════════════════════
// Health Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /health` - liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// ═══════════════════════════════════════════════════════════════════════════
// Metrics Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = ?e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        )
            .into_response();
    }

    (
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buffer,
    )
        .into_response()
}

// ═══════════════════════════════════════════════════════════════════════════
// Status Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /api/v1/status` - node status.
pub async fn status_handler(State(state): State<RpcState>) -> impl IntoResponse {
    let node_status = state.node_status.read().clone();
    let uptime = state.start_time.elapsed().as_secs();

    Json(NodeStatusResponse {
        active_sessions: node_status.active_sessions,
        buffered_broadcast_events: node_status.buffered_broadcast_events,
        penalties_proposed: node_status.penalties_proposed,
        uptime_secs: uptime,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Broadcast Delay Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `PUT /api/v1/sessions/{id}/broadcast-delay`.
///
/// Validates the preset here so a bad request is rejected with 400 before
/// anything reaches the event loop; no state changes on rejection.
pub async fn set_delay_handler(
    State(state): State<RpcState>,
    Path(session): Path<u64>,
    Json(request): Json<SetDelayRequest>,
) -> impl IntoResponse {
    if !delay_is_allowed(request.delay_ms) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "delay {}ms is not an allowed preset {:?}",
                    request.delay_ms, ALLOWED_BROADCAST_DELAYS_MS
                ),
            }),
        )
            .into_response();
    }

    let command = Event::SetDelayCommand {
        session: SessionId(session),
        delay_ms: request.delay_ms,
    };

    if state.event_tx.send(command).await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "event loop unavailable".to_string(),
            }),
        )
            .into_response();
    }

    tracing::info!(session, delay_ms = request.delay_ms, "Delay command accepted");

    (
        StatusCode::ACCEPTED,
        Json(SetDelayResponse {
            session,
            delay_ms: request.delay_ms,
            accepted: true,
        }),
    )
        .into_response()
}

/// Handler for `GET /api/v1/sessions/{id}/broadcast-delay`.
///
/// A session with no recorded delay command reports the zero-delay default.
pub async fn get_delay_handler(
    State(state): State<RpcState>,
    Path(session): Path<u64>,
) -> impl IntoResponse {
    let delay_state = state
        .delay_states
        .read()
        .get(&SessionId(session))
        .cloned()
        .unwrap_or_default();

    Json(DelayStateResponse {
        session,
        delay_ms: delay_state.delay_ms,
        queue_depth: delay_state.queue_depth,
        dropped_count: delay_state.dropped_count,
        is_delayed: delay_state.is_delayed,
    })
}
