//! Route configuration for the RPC API.

use super::handlers::*;
use super::state::RpcState;
use axum::{
    routing::{get, put},
    Router,
};

/// Create the full router with all RPC routes.
pub fn create_router(state: RpcState) -> Router {
    Router::new()
        // Liveness probe (no prefix)
        .route("/health", get(health_handler))
        // Metrics (no prefix, for Prometheus scraping)
        .route("/metrics", get(metrics_handler))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// Create the `/api/v1` router.
fn api_v1_routes() -> Router<RpcState> {
    Router::new()
        .route("/status", get(status_handler))
        .route(
            "/sessions/{id}/broadcast-delay",
            put(set_delay_handler).get(get_delay_handler),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::state::NodeStatusState;
    use axum::{body::Body, http::Request};
    use parking_lot::RwLock;
    use racecontrol_core::Event;
    use racecontrol_types::{DelayState, SessionId};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn create_test_state() -> (RpcState, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let state = RpcState {
            event_tx,
            delay_states: Arc::new(RwLock::new(HashMap::new())),
            node_status: Arc::new(RwLock::new(NodeStatusState::default())),
            start_time: Instant::now(),
        };
        (state, event_rx)
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (state, _rx) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn valid_delay_is_accepted_and_forwarded() {
        let (state, mut rx) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/sessions/7/broadcast-delay")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"delay_ms":30000}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);

        let event = rx.try_recv().expect("command must reach the event loop");
        assert!(matches!(
            event,
            Event::SetDelayCommand {
                session: SessionId(7),
                delay_ms: 30_000
            }
        ));
    }

    #[tokio::test]
    async fn invalid_delay_is_rejected_without_side_effects() {
        let (state, mut rx) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/sessions/7/broadcast-delay")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"delay_ms":12345}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err(), "No command may be forwarded");
    }

    #[tokio::test]
    async fn delay_state_reads_from_the_mirror() {
        let (state, _rx) = create_test_state();
        state.delay_states.write().insert(
            SessionId(3),
            DelayState {
                delay_ms: 60_000,
                queue_depth: 4,
                dropped_count: 0,
                is_delayed: true,
            },
        );
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sessions/3/broadcast-delay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["delay_ms"], 60_000);
        assert_eq!(body["is_delayed"], true);
    }

    #[tokio::test]
    async fn unknown_session_reports_zero_delay() {
        let (state, _rx) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sessions/999/broadcast-delay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["delay_ms"], 0);
        assert_eq!(body["is_delayed"], false);
    }
}
