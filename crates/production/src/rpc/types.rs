//! Request and response types for the RPC API.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════

/// Response for `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Node Status
// ═══════════════════════════════════════════════════════════════════════════

/// Response for `/api/v1/status` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusResponse {
    /// Sessions currently tracked.
    pub active_sessions: usize,
    /// Events currently held across all delay buffers.
    pub buffered_broadcast_events: usize,
    /// Penalties proposed since startup.
    pub penalties_proposed: u64,
    /// Node uptime in seconds.
    pub uptime_secs: u64,
    /// Version string.
    pub version: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// Broadcast Delay
// ═══════════════════════════════════════════════════════════════════════════

/// Request body for `PUT /api/v1/sessions/{id}/broadcast-delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDelayRequest {
    /// Requested delay in milliseconds. Must be one of the allowed presets.
    pub delay_ms: u64,
}

/// Response for an accepted delay command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDelayResponse {
    pub session: u64,
    pub delay_ms: u64,
    pub accepted: bool,
}

/// Response for `GET /api/v1/sessions/{id}/broadcast-delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayStateResponse {
    pub session: u64,
    pub delay_ms: u64,
    pub queue_depth: usize,
    pub dropped_count: u64,
    pub is_delayed: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════

/// Generic error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
