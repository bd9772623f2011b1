//! Production metrics using native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters.
//! Use traces for event-level granularity during investigations.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for production monitoring.
pub struct Metrics {
    // === Incidents ===
    pub incidents_classified: CounterVec,
    pub incident_pipeline_latency: Histogram,

    // === Penalties ===
    pub penalties_proposed: Counter,
    pub penalties_persisted: Counter,
    pub penalty_persist_failures: Counter,

    // === Distribution ===
    pub live_events_emitted: Counter,
    pub broadcast_events_released: Counter,
    pub broadcast_events_dropped: Counter,
    pub broadcast_queue_depth: Gauge,
    pub viewer_connections: Gauge,

    // === Sessions ===
    pub active_sessions: Gauge,
    pub telemetry_frames_received: Counter,

    // === Rulebook ===
    pub rulebook_reloads: Counter,
}

impl Metrics {
    fn new() -> Self {
        // Latency buckets: 100us to 1s
        let latency_buckets = vec![
            0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
        ];

        Self {
            incidents_classified: register_counter_vec!(
                "racecontrol_incidents_classified_total",
                "Total incidents classified, by contact type",
                &["contact_type"]
            )
            .unwrap(),
            incident_pipeline_latency: register_histogram!(
                "racecontrol_incident_pipeline_latency_seconds",
                "Wall time from trigger ingest to actions emitted",
                latency_buckets
            )
            .unwrap(),
            penalties_proposed: register_counter!(
                "racecontrol_penalties_proposed_total",
                "Total penalties proposed by the rulebook engine"
            )
            .unwrap(),
            penalties_persisted: register_counter!(
                "racecontrol_penalties_persisted_total",
                "Total penalties successfully written to the store"
            )
            .unwrap(),
            penalty_persist_failures: register_counter!(
                "racecontrol_penalty_persist_failures_total",
                "Total penalty store writes that failed"
            )
            .unwrap(),
            live_events_emitted: register_counter!(
                "racecontrol_live_events_emitted_total",
                "Total events published on live channels"
            )
            .unwrap(),
            broadcast_events_released: register_counter!(
                "racecontrol_broadcast_events_released_total",
                "Total events released from delay buffers to broadcast channels"
            )
            .unwrap(),
            broadcast_events_dropped: register_counter!(
                "racecontrol_broadcast_events_dropped_total",
                "Total broadcast events dropped to capacity limits"
            )
            .unwrap(),
            broadcast_queue_depth: register_gauge!(
                "racecontrol_broadcast_queue_depth",
                "Events currently held across all delay buffers"
            )
            .unwrap(),
            viewer_connections: register_gauge!(
                "racecontrol_viewer_connections",
                "Viewers currently registered across all sessions"
            )
            .unwrap(),
            active_sessions: register_gauge!(
                "racecontrol_active_sessions",
                "Sessions currently tracked"
            )
            .unwrap(),
            telemetry_frames_received: register_counter!(
                "racecontrol_telemetry_frames_received_total",
                "Total telemetry frames ingested"
            )
            .unwrap(),
            rulebook_reloads: register_counter!(
                "racecontrol_rulebook_reloads_total",
                "Total rulebook install operations"
            )
            .unwrap(),
        }
    }
}

/// Get the global metrics instance, initializing on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_once() {
        // Second call must return the same instance without re-registering.
        let a = metrics() as *const Metrics;
        let b = metrics() as *const Metrics;
        assert_eq!(a, b);
    }

    #[test]
    fn counters_accumulate() {
        let m = metrics();
        let before = m.penalties_proposed.get();
        m.penalties_proposed.inc();
        assert!(m.penalties_proposed.get() >= before + 1.0);
    }
}
