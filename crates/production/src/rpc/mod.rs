//! HTTP RPC server for the stewarding node.
//!
//! This module provides the HTTP API for operating a running node:
//!
//! # Health & Observability
//!
//! - `GET /health` - Liveness probe (always returns 200 if server running)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/v1/status` - Node counters (sessions, buffered events, penalties)
//!
//! # Director Commands
//!
//! - `PUT /api/v1/sessions/{id}/broadcast-delay` - Set the broadcast delay
//!   for a session. The delay must be one of the allowed presets; anything
//!   else is rejected with 400 and changes nothing.
//! - `GET /api/v1/sessions/{id}/broadcast-delay` - Current delay state for
//!   a session (delay, queue depth, drop count).
//!
//! Commands are forwarded into the runner's event loop; the server itself
//! holds no stewarding state beyond the read-only mirrors the runner
//! maintains for it.

mod handlers;
mod routes;
mod server;
mod state;
mod types;

pub use routes::create_router;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
pub use state::{NodeStatusState, RpcState};
pub use types::*;
