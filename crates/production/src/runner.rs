//! Production runner implementation.
//!
//! Owns the deterministic state machine and serializes every event through
//! it from a single tokio task. Delegated work (store reads and writes) is
//! spawned off the loop and feeds results back as internal events, so a
//! slow disk never stalls stewarding.

use crate::channels::{SessionChannels, ViewerControl};
use crate::metrics::metrics;
use crate::rpc::NodeStatusState;
use crate::storage::{PenaltyStore, RulebookStore};
use crate::timers::TimerManager;
use parking_lot::RwLock;
use racecontrol_core::{Action, Event, StateMachine};
use racecontrol_node::RaceControlStateMachine;
use racecontrol_rulebook::RulebookEngine;
use racecontrol_types::{ChannelEvent, DelayState, Penalty, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, span, warn, Level};

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Event channel closed")]
    ChannelClosed,
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
}

/// Handle for shutting down a running ProductionRunner.
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloneable handle for interacting with a running runner.
///
/// Ingest adapters and the RPC layer submit events through it; channel
/// consumers subscribe through it.
#[derive(Clone)]
pub struct RunnerHandle {
    event_tx: mpsc::Sender<Event>,
    channels: Arc<SessionChannels>,
    penalty_tx: broadcast::Sender<Penalty>,
    delay_states: Arc<RwLock<HashMap<SessionId, DelayState>>>,
    node_status: Arc<RwLock<NodeStatusState>>,
}

impl RunnerHandle {
    /// Submit an event to the runner's event loop.
    pub async fn submit(&self, event: Event) -> Result<(), RunnerError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RunnerError::ChannelClosed)
    }

    /// Sender half of the ingest channel, for adapters that hold their own.
    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    /// Subscribe to a session's live channel (officials/teams).
    pub fn subscribe_live(&self, session: SessionId) -> broadcast::Receiver<ChannelEvent> {
        self.channels.subscribe_live(session)
    }

    /// Subscribe to a session's public broadcast channel.
    pub fn subscribe_broadcast(&self, session: SessionId) -> broadcast::Receiver<ChannelEvent> {
        self.channels.subscribe_broadcast(session)
    }

    /// Subscribe to a session's viewer-demand advisories.
    pub fn subscribe_control(&self, session: SessionId) -> broadcast::Receiver<ViewerControl> {
        self.channels.subscribe_control(session)
    }

    /// Subscribe to proposed penalties across all sessions (review tooling).
    pub fn subscribe_penalties(&self) -> broadcast::Receiver<Penalty> {
        self.penalty_tx.subscribe()
    }

    /// Current delay state for a session (zero-delay default if unknown).
    pub fn delay_state(&self, session: SessionId) -> DelayState {
        self.delay_states
            .read()
            .get(&session)
            .copied()
            .unwrap_or_default()
    }

    /// Shared mirror of per-session delay state, for the RPC layer.
    pub fn delay_states(&self) -> Arc<RwLock<HashMap<SessionId, DelayState>>> {
        self.delay_states.clone()
    }

    /// Shared node counters, for the RPC layer.
    pub fn node_status(&self) -> Arc<RwLock<NodeStatusState>> {
        self.node_status.clone()
    }
}

/// Builder for constructing a [`ProductionRunner`].
///
/// Required fields:
/// - `rulebook_store` - Source of the active rulebook document
/// - `penalty_store` - Sink for generated penalties
///
/// Optional fields:
/// - `engine` - Pre-built rulebook engine (default: empty, loaded on start)
/// - `channel_capacity` - Event and fan-out channel capacity (default: 1024)
pub struct ProductionRunnerBuilder {
    engine: Option<Arc<RulebookEngine>>,
    rulebook_store: Option<Arc<dyn RulebookStore>>,
    penalty_store: Option<Arc<dyn PenaltyStore>>,
    channel_capacity: usize,
}

impl Default for ProductionRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionRunnerBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            rulebook_store: None,
            penalty_store: None,
            channel_capacity: 1024,
        }
    }

    pub fn engine(mut self, engine: Arc<RulebookEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn rulebook_store(mut self, store: Arc<dyn RulebookStore>) -> Self {
        self.rulebook_store = Some(store);
        self
    }

    pub fn penalty_store(mut self, store: Arc<dyn PenaltyStore>) -> Self {
        self.penalty_store = Some(store);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<ProductionRunner, RunnerError> {
        let rulebook_store = self
            .rulebook_store
            .ok_or(RunnerError::MissingComponent("rulebook_store"))?;
        let penalty_store = self
            .penalty_store
            .ok_or(RunnerError::MissingComponent("penalty_store"))?;
        let engine = self.engine.unwrap_or_else(|| Arc::new(RulebookEngine::new()));

        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let (timer_tx, timer_rx) = mpsc::channel(self.channel_capacity);
        let (callback_tx, callback_rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (penalty_tx, _) = broadcast::channel(self.channel_capacity);

        Ok(ProductionRunner {
            machine: RaceControlStateMachine::new(engine),
            timers: TimerManager::new(timer_tx),
            channels: Arc::new(SessionChannels::new(self.channel_capacity)),
            rulebook_store,
            penalty_store,
            event_tx,
            event_rx,
            timer_rx,
            callback_tx,
            callback_rx,
            penalty_tx,
            delay_states: Arc::new(RwLock::new(HashMap::new())),
            node_status: Arc::new(RwLock::new(NodeStatusState::default())),
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            start_time: Instant::now(),
            viewer_counts: HashMap::new(),
        })
    }
}

/// Owns the state machine and runs the event loop.
pub struct ProductionRunner {
    machine: RaceControlStateMachine,
    timers: TimerManager,
    channels: Arc<SessionChannels>,
    rulebook_store: Arc<dyn RulebookStore>,
    penalty_store: Arc<dyn PenaltyStore>,

    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    /// Dedicated timer channel so flush ticks are never queued behind a
    /// telemetry flood.
    timer_rx: mpsc::Receiver<Event>,
    callback_tx: mpsc::Sender<Event>,
    callback_rx: mpsc::Receiver<Event>,
    penalty_tx: broadcast::Sender<Penalty>,

    delay_states: Arc<RwLock<HashMap<SessionId, DelayState>>>,
    node_status: Arc<RwLock<NodeStatusState>>,

    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: oneshot::Receiver<()>,
    start_time: Instant,
    viewer_counts: HashMap<SessionId, usize>,
}

/// Which session an event concerns, for mirror refreshes after handling.
fn event_session(event: &Event) -> Option<SessionId> {
    match event {
        Event::SessionStarted { session } => Some(session.id),
        Event::SessionStatusChanged { session, .. }
        | Event::TelemetryReceived { session, .. }
        | Event::RaceFlagChanged { session, .. }
        | Event::SetDelayCommand { session, .. }
        | Event::ViewerJoined { session, .. }
        | Event::ViewerLeft { session, .. } => Some(*session),
        Event::IncidentTriggerReceived { trigger } => Some(trigger.session),
        _ => None,
    }
}

impl ProductionRunner {
    pub fn builder() -> ProductionRunnerBuilder {
        ProductionRunnerBuilder::new()
    }

    /// Cloneable handle for submitting events and subscribing to channels.
    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            event_tx: self.event_tx.clone(),
            channels: self.channels.clone(),
            penalty_tx: self.penalty_tx.clone(),
            delay_states: self.delay_states.clone(),
            node_status: self.node_status.clone(),
        }
    }

    /// Take the shutdown handle. Returns `None` after the first call.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx.take().map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    /// Run the event loop until shutdown.
    ///
    /// # Priority Handling
    ///
    /// Uses a `biased` select so timer fires and internal callbacks are
    /// always drained before ingest and operator events. Matches the
    /// simulation's priority ordering, just with wall-clock time.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        info!("Starting production runner");

        // Startup: fetch the active rulebook, arm the flush tick.
        for action in self.machine.initialize() {
            self.process_action(action);
        }

        // Metrics tick interval (1 second)
        let mut metrics_tick = tokio::time::interval(Duration::from_secs(1));
        metrics_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                // Shutdown first so a flooded ingest channel cannot delay it.
                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                // Timer fires (flush tick) on a dedicated channel.
                Some(event) = self.timer_rx.recv() => {
                    self.dispatch(event);
                }

                // Internal callbacks (persist results, loaded rulebooks).
                Some(event) = self.callback_rx.recv() => {
                    self.dispatch(event);
                }

                // Ingest and operator events.
                Some(event) = self.event_rx.recv() => {
                    self.dispatch(event);
                }

                _ = metrics_tick.tick() => {
                    self.refresh_node_status();
                }
            }
        }

        self.timers.cancel_all();
        info!("Production runner stopped");
        Ok(())
    }

    /// Feed one event through the state machine and execute its actions.
    fn dispatch(&mut self, event: Event) {
        let event_type = event.type_name();
        let event_span = span!(Level::DEBUG, "handle_event", event.r#type = %event_type);
        let _guard = event_span.enter();

        self.observe_event(&event);
        let session = event_session(&event);
        let started = Instant::now();
        let is_trigger = matches!(event, Event::IncidentTriggerReceived { .. });

        self.machine.set_time(self.start_time.elapsed());
        let actions = self.machine.handle(event);
        debug!(actions = actions.len(), "Event handled");

        for action in actions {
            self.process_action(action);
        }

        if is_trigger {
            metrics()
                .incident_pipeline_latency
                .observe(started.elapsed().as_secs_f64());
        }

        self.refresh_delay_mirror(session);
    }

    /// Side effects that belong to the runner, not the state machine.
    fn observe_event(&self, event: &Event) {
        match event {
            Event::TelemetryReceived { frames, .. } => {
                metrics()
                    .telemetry_frames_received
                    .inc_by(frames.len() as f64);
            }
            Event::RulebookLoaded { rulebook } => {
                metrics().rulebook_reloads.inc();
                info!(
                    id = %rulebook.id,
                    version = rulebook.version,
                    rules = rulebook.rules.len(),
                    "Rulebook loaded"
                );
            }
            Event::PenaltyReviewRecorded { penalty, status } => {
                // Mirror the review decision into the durable store.
                let store = self.penalty_store.clone();
                let penalty = *penalty;
                let status = *status;
                tokio::spawn(async move {
                    let result =
                        tokio::task::spawn_blocking(move || store.set_status(penalty, status))
                            .await;
                    if let Ok(Err(e)) = result {
                        warn!(penalty = %penalty, error = %e, "Penalty status update failed");
                    }
                });
            }
            _ => {}
        }
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => {
                self.timers.set_timer(id, duration);
            }
            Action::CancelTimer { id } => {
                self.timers.cancel_timer(id);
            }
            Action::EnqueueInternal { event } => {
                // try_send: the loop would deadlock awaiting its own channel.
                if self.callback_tx.try_send(event).is_err() {
                    error!("Internal event channel full, dropping event");
                }
            }
            Action::EmitLive { session, event } => {
                if event.name == "incident:classified" {
                    if let Some(contact_type) =
                        event.payload["contact"]["contactType"].as_str()
                    {
                        metrics()
                            .incidents_classified
                            .with_label_values(&[contact_type])
                            .inc();
                    }
                }
                metrics().live_events_emitted.inc();
                self.channels.publish_live(session, event);
            }
            Action::EmitBroadcast { session, event } => {
                metrics().broadcast_events_released.inc();
                self.channels.publish_broadcast(session, event);
            }
            Action::EmitViewerControl {
                session,
                viewer_count,
                request_controls,
            } => {
                self.viewer_counts.insert(session, viewer_count);
                let total: usize = self.viewer_counts.values().sum();
                metrics().viewer_connections.set(total as f64);
                self.channels.publish_control(
                    session,
                    ViewerControl {
                        viewer_count,
                        request_controls,
                    },
                );
            }
            Action::EmitPenaltyProposed { penalty } => {
                metrics().penalties_proposed.inc();
                self.node_status.write().penalties_proposed += 1;
                let _ = self.penalty_tx.send(penalty);
            }
            Action::PersistPenalty { penalty } => {
                self.spawn_persist(penalty);
            }
            Action::FetchActiveRulebook => {
                self.spawn_rulebook_fetch();
            }
        }
    }

    /// Persist one penalty off the event loop and report back as an event.
    ///
    /// A store failure is scoped to this one penalty; the loop keeps
    /// running and the failure comes back as `PenaltyPersisted { ok: false }`.
    fn spawn_persist(&self, penalty: Penalty) {
        let store = self.penalty_store.clone();
        let callback_tx = self.callback_tx.clone();
        let id = penalty.id;

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || store.create(&penalty)).await;
            let ok = match result {
                Ok(Ok(())) => {
                    metrics().penalties_persisted.inc();
                    true
                }
                Ok(Err(e)) => {
                    warn!(penalty = %id, error = %e, "Penalty store write failed");
                    metrics().penalty_persist_failures.inc();
                    false
                }
                Err(e) => {
                    warn!(penalty = %id, error = %e, "Penalty store task panicked");
                    metrics().penalty_persist_failures.inc();
                    false
                }
            };
            let _ = callback_tx.send(Event::PenaltyPersisted { penalty: id, ok }).await;
        });
    }

    fn spawn_rulebook_fetch(&self) {
        let store = self.rulebook_store.clone();
        let callback_tx = self.callback_tx.clone();

        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || store.find_active()).await {
                Ok(Ok(Some(rulebook))) => {
                    let event = Event::RulebookLoaded {
                        rulebook: Arc::new(rulebook),
                    };
                    let _ = callback_tx.send(event).await;
                }
                Ok(Ok(None)) => {
                    warn!("No active rulebook document; incidents will classify without penalties");
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Failed to load active rulebook");
                }
                Err(e) => {
                    error!(error = %e, "Rulebook fetch task panicked");
                }
            }
        });
    }

    /// Keep the RPC-visible delay mirror in step with the machine.
    fn refresh_delay_mirror(&mut self, session: Option<SessionId>) {
        let Some(session) = session else {
            // Flush ticks and callbacks can move every buffer.
            let tracked: Vec<SessionId> = self.delay_states.read().keys().copied().collect();
            for session in tracked {
                self.refresh_one(session);
            }
            return;
        };
        self.refresh_one(session);
    }

    fn refresh_one(&mut self, session: SessionId) {
        if self.machine.sessions().session(session).is_none() {
            self.delay_states.write().remove(&session);
            self.viewer_counts.remove(&session);
            self.channels.teardown(session);
            return;
        }

        let state = self.machine.distribution().state(session);
        let mut mirror = self.delay_states.write();
        if let Some(previous) = mirror.get(&session) {
            let newly_dropped = state.dropped_count.saturating_sub(previous.dropped_count);
            if newly_dropped > 0 {
                metrics()
                    .broadcast_events_dropped
                    .inc_by(newly_dropped as f64);
            }
        }
        mirror.insert(session, state);
    }

    fn refresh_node_status(&self) {
        let active_sessions = self.machine.sessions().session_count();
        let buffered: usize = self
            .delay_states
            .read()
            .values()
            .map(|s| s.queue_depth)
            .sum();

        metrics().active_sessions.set(active_sessions as f64);
        metrics().broadcast_queue_depth.set(buffered as f64);

        let mut status = self.node_status.write();
        status.active_sessions = active_sessions;
        status.buffered_broadcast_events = buffered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileRulebookStore, InMemoryPenaltyStore};
    use racecontrol_types::test_utils::test_trigger;
    use racecontrol_types::{
        RaceFlag, Rulebook, Session, SessionPhase, SessionStatus, TriggerKind, TriggerPayload,
    };
    use serde_json::json;

    fn test_session(id: u64) -> Session {
        Session {
            id: SessionId(id),
            external_id: format!("sess-{id}"),
            status: SessionStatus::Active,
            track_name: "Spa".to_string(),
            flag: RaceFlag::Green,
            phase: SessionPhase::Racing,
        }
    }

    fn contact_rulebook() -> Rulebook {
        serde_json::from_value(json!({
            "id": "test-book",
            "version": 1,
            "rules": [{
                "reference": "SR-1.1",
                "title": "Avoidable contact",
                "condition": { "kind": "compare", "field": "has_contact", "op": "eq", "value": 1.0 },
                "penalty": { "kind": "time_penalty", "value": 5.0, "points": 2 },
                "priority": 10
            }]
        }))
        .unwrap()
    }

    fn store_with_active(rulebook: &Rulebook) -> (tempfile::TempDir, Arc<FileRulebookStore>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(FileRulebookStore::ACTIVE_FILE),
            serde_json::to_string(rulebook).unwrap(),
        )
        .unwrap();
        let store = Arc::new(FileRulebookStore::new(dir.path()));
        (dir, store)
    }

    async fn recv_named(
        rx: &mut broadcast::Receiver<ChannelEvent>,
        name: &str,
    ) -> ChannelEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for channel event")
                .expect("channel closed");
            if event.name == name {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn session_events_reach_the_live_channel() {
        let (_dir, rulebook_store) = store_with_active(&contact_rulebook());
        let penalty_store = Arc::new(InMemoryPenaltyStore::new());

        let mut runner = ProductionRunner::builder()
            .rulebook_store(rulebook_store)
            .penalty_store(penalty_store)
            .build()
            .unwrap();

        let handle = runner.handle();
        let shutdown = runner.shutdown_handle().unwrap();
        let task = tokio::spawn(runner.run());

        let mut live = handle.subscribe_live(SessionId(1));
        handle
            .submit(Event::SessionStarted {
                session: test_session(1),
            })
            .await
            .unwrap();

        let event = recv_named(&mut live, "session:started").await;
        assert_eq!(event.payload["id"], 1);

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn incident_produces_a_persisted_penalty() {
        let (_dir, rulebook_store) = store_with_active(&contact_rulebook());
        let penalty_store = Arc::new(InMemoryPenaltyStore::new());

        // Pre-install the rulebook so the trigger below cannot race the
        // async fetch kicked off at startup.
        let engine = Arc::new(RulebookEngine::new());
        engine.install(contact_rulebook()).unwrap();

        let mut runner = ProductionRunner::builder()
            .engine(engine)
            .rulebook_store(rulebook_store)
            .penalty_store(penalty_store.clone())
            .build()
            .unwrap();

        let handle = runner.handle();
        let shutdown = runner.shutdown_handle().unwrap();
        let task = tokio::spawn(runner.run());

        let mut penalties = handle.subscribe_penalties();
        handle
            .submit(Event::SessionStarted {
                session: test_session(1),
            })
            .await
            .unwrap();

        let mut trigger = test_trigger(
            TriggerKind::ContactReported,
            TriggerPayload::ContactSensor { incident_delta: 1 },
            7,
            &[11],
        );
        // Real contact, not a netcode artifact.
        trigger.context.speed_differential = Some(12.0);
        handle
            .submit(Event::IncidentTriggerReceived { trigger })
            .await
            .unwrap();

        let penalty = tokio::time::timeout(Duration::from_secs(2), penalties.recv())
            .await
            .expect("timed out waiting for penalty")
            .unwrap();
        assert_eq!(penalty.rule_reference, "SR-1.1");

        // The persist callback lands shortly after the proposal.
        let deadline = Instant::now() + Duration::from_secs(2);
        while penalty_store.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(penalty_store.len(), 1);

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn delay_command_updates_the_mirror() {
        let (_dir, rulebook_store) = store_with_active(&contact_rulebook());

        let mut runner = ProductionRunner::builder()
            .rulebook_store(rulebook_store)
            .penalty_store(Arc::new(InMemoryPenaltyStore::new()))
            .build()
            .unwrap();

        let handle = runner.handle();
        let shutdown = runner.shutdown_handle().unwrap();
        let task = tokio::spawn(runner.run());

        handle
            .submit(Event::SessionStarted {
                session: test_session(2),
            })
            .await
            .unwrap();
        handle
            .submit(Event::SetDelayCommand {
                session: SessionId(2),
                delay_ms: 30_000,
            })
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let state = handle.delay_state(SessionId(2));
            if state.delay_ms == 30_000 {
                assert!(state.is_delayed);
                break;
            }
            assert!(Instant::now() < deadline, "mirror never updated");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dropping_the_shutdown_handle_stops_the_runner() {
        let (_dir, rulebook_store) = store_with_active(&contact_rulebook());

        let mut runner = ProductionRunner::builder()
            .rulebook_store(rulebook_store)
            .penalty_store(Arc::new(InMemoryPenaltyStore::new()))
            .build()
            .unwrap();

        let shutdown = runner.shutdown_handle().unwrap();
        assert!(runner.shutdown_handle().is_none());

        let task = tokio::spawn(runner.run());
        drop(shutdown);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("runner did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn builder_requires_stores() {
        let result = ProductionRunner::builder().build();
        assert!(matches!(
            result,
            Err(RunnerError::MissingComponent("rulebook_store"))
        ));
    }
}
