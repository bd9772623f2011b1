//! RaceControl state machine.

use std::sync::Arc;
use std::time::Duration;

use racecontrol_broadcast::DistributionState;
use racecontrol_classifier::{classify_contact, predict_responsibility, score_severity};
use racecontrol_core::{Action, Event, StateMachine, SubStateMachine, TimerId};
use racecontrol_rulebook::RulebookEngine;
use racecontrol_session::SessionTracker;
use racecontrol_types::{
    ChannelEvent, IncidentEvent, IncidentId, IncidentStatus, IncidentTrigger, SessionId,
    SessionStatus,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::registry::IncidentRegistry;

/// Cadence of the broadcast buffer flush tick.
pub const BROADCAST_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Combined stewarding state machine.
///
/// Composes the session tracker, the distribution gateway, and the incident
/// registry, with a shared read-only handle to the rulebook engine. All
/// dependencies arrive through the constructor; there is no ambient global
/// state. The runner owns the instance and serializes every event through
/// [`StateMachine::handle`].
pub struct RaceControlStateMachine {
    sessions: SessionTracker,
    distribution: DistributionState,
    engine: Arc<RulebookEngine>,
    registry: IncidentRegistry,
    next_incident_id: IncidentId,
    now: Duration,
}

impl RaceControlStateMachine {
    pub fn new(engine: Arc<RulebookEngine>) -> Self {
        Self {
            sessions: SessionTracker::new(),
            distribution: DistributionState::new(),
            engine,
            registry: IncidentRegistry::new(),
            next_incident_id: IncidentId(1),
            now: Duration::ZERO,
        }
    }

    /// Startup actions: load the active rulebook and arm the flush tick.
    pub fn initialize(&mut self) -> Vec<Action> {
        vec![
            Action::FetchActiveRulebook,
            Action::SetTimer {
                id: TimerId::BroadcastFlush,
                duration: BROADCAST_FLUSH_INTERVAL,
            },
        ]
    }

    pub fn registry(&self) -> &IncidentRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn distribution(&self) -> &DistributionState {
        &self.distribution
    }

    fn allocate_incident_id(&mut self) -> IncidentId {
        let id = self.next_incident_id;
        self.next_incident_id = id.next();
        id
    }

    /// The flush tick re-arms itself; everything due across all sessions is
    /// released in one pass.
    fn on_broadcast_flush(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::SetTimer {
            id: TimerId::BroadcastFlush,
            duration: BROADCAST_FLUSH_INTERVAL,
        }];
        actions.extend(self.distribution.on_flush());
        actions
    }

    #[instrument(skip(self, trigger), fields(session = %trigger.session, kind = %trigger.kind))]
    fn on_incident_trigger(&mut self, mut trigger: IncidentTrigger) -> Vec<Action> {
        // Enrich missing speed signals from the last telemetry snapshot.
        if trigger.context.current_speed.is_none() {
            trigger.context.current_speed = self
                .sessions
                .last_speed(trigger.session, trigger.primary_driver);
        }

        let session = trigger.session;
        let contact = classify_contact(&trigger);
        let severity = score_severity(&trigger, contact.contact_type);
        let observations = self
            .sessions
            .observations(session, &trigger.involved_drivers());
        let responsibility = predict_responsibility(&trigger, &observations);

        let incident = IncidentEvent {
            id: self.allocate_incident_id(),
            trigger,
            contact,
            severity,
            responsibility,
            ai_analysis: None,
            status: IncidentStatus::Pending,
        };

        let penalties = self.engine.process_incident(&incident);

        let mut actions = self
            .distribution
            .distribute(session, named("incident:classified", &incident));
        self.registry.record_incident(incident);

        for penalty in penalties {
            actions.extend(
                self.distribution
                    .distribute(session, named("penalty:proposed", &penalty)),
            );
            actions.push(Action::EmitPenaltyProposed {
                penalty: penalty.clone(),
            });
            actions.push(Action::PersistPenalty {
                penalty: penalty.clone(),
            });
            self.registry.record_penalty(penalty);
        }
        actions
    }

    fn on_session_status(&mut self, session: SessionId, status: SessionStatus) -> Vec<Action> {
        let terminal = self.sessions.on_status_changed(session, status);
        if terminal {
            // Queued broadcast events are discarded, not flushed early; the
            // status change itself still reaches officials.
            self.distribution.teardown(session);
            self.registry.teardown_session(session);
            return vec![Action::EmitLive {
                session,
                event: ChannelEvent::new(
                    "session:status",
                    json!({ "sessionId": session.0, "status": status }),
                ),
            }];
        }
        self.distribution.distribute(
            session,
            ChannelEvent::new(
                "session:status",
                json!({ "sessionId": session.0, "status": status }),
            ),
        )
    }
}

/// Build a channel event, degrading to a null payload if serialization
/// fails rather than dropping the notification.
fn named<T: Serialize>(name: &str, value: &T) -> ChannelEvent {
    let payload = match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!(event = name, error = %e, "payload serialization failed");
            Value::Null
        }
    };
    ChannelEvent::new(name, payload)
}

impl StateMachine for RaceControlStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::BroadcastFlushTimer => self.on_broadcast_flush(),

            Event::SessionStarted { session } => {
                let id = session.id;
                let payload = named("session:started", &session);
                self.sessions.on_session_started(session);
                self.distribution.distribute(id, payload)
            }

            Event::SessionStatusChanged { session, status } => {
                self.on_session_status(session, status)
            }

            Event::TelemetryReceived { session, frames } => {
                let payload = json!({
                    "sessionId": session.0,
                    "frames": frames
                        .iter()
                        .map(|(driver, t)| {
                            json!({ "driverId": driver.0, "telemetry": t })
                        })
                        .collect::<Vec<_>>(),
                });
                self.sessions.on_telemetry(session, frames);
                self.distribution
                    .distribute(session, ChannelEvent::new("telemetry:update", payload))
            }

            Event::RaceFlagChanged {
                session,
                flag,
                phase,
                lap,
            } => {
                self.sessions.on_flag_changed(session, flag, phase);
                self.distribution.distribute(
                    session,
                    ChannelEvent::new(
                        "flag:changed",
                        json!({
                            "sessionId": session.0,
                            "flag": flag,
                            "phase": phase,
                            "lap": lap,
                        }),
                    ),
                )
            }

            Event::IncidentTriggerReceived { trigger } => self.on_incident_trigger(trigger),

            Event::SetDelayCommand { session, delay_ms } => {
                match self.distribution.on_set_delay(session, delay_ms) {
                    Ok(state) => vec![Action::EmitLive {
                        session,
                        event: named("broadcast:delay", &state),
                    }],
                    // Already logged; invalid commands have no side effects.
                    Err(_) => Vec::new(),
                }
            }

            Event::ViewerJoined {
                session,
                viewer,
                is_relay,
            } => self.distribution.on_viewer_joined(session, viewer, is_relay),

            Event::ViewerLeft { session, viewer } => {
                self.distribution.on_viewer_left(session, &viewer)
            }

            Event::IncidentReviewRecorded { incident, status } => {
                match self.registry.review_incident(incident, status) {
                    Some(updated) => {
                        let session = updated.trigger.session;
                        let event = named("incident:reviewed", updated);
                        vec![Action::EmitLive { session, event }]
                    }
                    None => Vec::new(),
                }
            }

            Event::PenaltyReviewRecorded { penalty, status } => {
                match self.registry.review_penalty(penalty, status) {
                    Some(updated) => {
                        let session = updated.session;
                        let event = named("penalty:reviewed", updated);
                        vec![Action::EmitLive { session, event }]
                    }
                    None => Vec::new(),
                }
            }

            Event::AiAnalysisReceived { incident, analysis } => {
                match self.registry.attach_analysis(incident, analysis) {
                    Some(updated) => {
                        let session = updated.trigger.session;
                        let event = named("incident:analysis", updated);
                        vec![Action::EmitLive { session, event }]
                    }
                    None => Vec::new(),
                }
            }

            Event::RulebookLoaded { rulebook } => {
                if let Err(e) = self.engine.install((*rulebook).clone()) {
                    warn!(error = %e, "rulebook rejected, keeping previous");
                }
                Vec::new()
            }

            Event::PenaltyPersisted { penalty, ok } => {
                if !ok {
                    warn!(penalty = %penalty, "penalty persistence failed");
                }
                Vec::new()
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.sessions.set_time(now);
        self.distribution.set_time(now);
    }
}
