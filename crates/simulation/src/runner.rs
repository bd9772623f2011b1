//! Virtual-clock runner for the stewarding state machine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use racecontrol_core::{Action, Event, StateMachine, TimerId};
use racecontrol_node::RaceControlStateMachine;
use racecontrol_rulebook::RulebookEngine;
use racecontrol_types::{ChannelEvent, Penalty, Rulebook, SessionId};
use tracing::{debug, trace, warn};

use crate::event_queue::EventKey;

/// One event emitted on a distribution channel, with the virtual time of
/// its emission.
#[derive(Debug, Clone)]
pub struct RecordedEmission {
    pub time: Duration,
    pub session: SessionId,
    pub event: ChannelEvent,
}

/// Statistics collected during a run.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// Penalty persistence attempts.
    pub persist_attempts: u64,
    /// Penalty persistence failures (injected).
    pub persist_failures: u64,
}

/// Deterministic simulation runner.
///
/// Owns one state machine and executes its actions inline. Timers become
/// queue entries; persistence runs against an in-memory store with an
/// injectable failure switch; every channel emission is recorded with its
/// virtual timestamp for assertions.
pub struct SimulationRunner {
    machine: RaceControlStateMachine,
    event_queue: BTreeMap<EventKey, Event>,
    sequence: u64,
    now: Duration,
    timers: HashMap<TimerId, EventKey>,
    stats: SimulationStats,

    /// Rulebook returned by `Action::FetchActiveRulebook`, if any.
    stored_rulebook: Option<Rulebook>,
    /// When set, every persistence attempt fails.
    fail_persistence: bool,

    live: Vec<RecordedEmission>,
    broadcast: Vec<RecordedEmission>,
    viewer_controls: Vec<(Duration, SessionId, usize, bool)>,
    proposed: Vec<Penalty>,
    persisted: Vec<Penalty>,
}

impl SimulationRunner {
    /// Create a runner with no stored rulebook.
    pub fn new() -> Self {
        Self::with_rulebook(None)
    }

    /// Create a runner whose store holds the given active rulebook.
    pub fn with_rulebook(rulebook: Option<Rulebook>) -> Self {
        let engine = Arc::new(RulebookEngine::new());
        Self {
            machine: RaceControlStateMachine::new(engine),
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            timers: HashMap::new(),
            stats: SimulationStats::default(),
            stored_rulebook: rulebook,
            fail_persistence: false,
            live: Vec::new(),
            broadcast: Vec::new(),
            viewer_controls: Vec::new(),
            proposed: Vec::new(),
            persisted: Vec::new(),
        }
    }

    /// Make every subsequent persistence attempt fail.
    pub fn fail_persistence(&mut self, fail: bool) {
        self.fail_persistence = fail;
    }

    /// Run the machine's startup actions (rulebook fetch + flush tick).
    pub fn initialize(&mut self) {
        for action in self.machine.initialize() {
            self.process_action(action);
        }
    }

    /// Schedule an event to arrive at an absolute virtual time.
    pub fn schedule_at(&mut self, time: Duration, event: Event) {
        self.schedule_event(time, event);
    }

    /// Schedule an event relative to the current virtual time.
    pub fn schedule(&mut self, delay: Duration, event: Event) {
        self.schedule_event(self.now + delay, event);
    }

    /// Run until the queue is drained or virtual time passes `end_time`.
    pub fn run_until(&mut self, end_time: Duration) {
        loop {
            let Some((&key, _)) = self.event_queue.first_key_value() else {
                break;
            };
            if key.time > end_time {
                break;
            }
            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;

            trace!(time = ?self.now, event = event.type_name(), "processing event");
            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            self.machine.set_time(self.now);
            let actions = self.machine.handle(event);
            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(action);
            }
        }
        // Time advances to the requested horizon even when the queue runs
        // dry earlier, so consecutive run_until calls compose.
        if self.now < end_time {
            self.now = end_time;
            self.machine.set_time(self.now);
        }
    }

    fn schedule_event(&mut self, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => {
                let fire_time = self.now + duration;
                let key = self.schedule_event(fire_time, timer_event(id));
                self.timers.insert(id, key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&id) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::EnqueueInternal { event } => {
                self.schedule_event(self.now, event);
            }

            Action::EmitLive { session, event } => {
                self.live.push(RecordedEmission {
                    time: self.now,
                    session,
                    event,
                });
            }

            Action::EmitBroadcast { session, event } => {
                self.broadcast.push(RecordedEmission {
                    time: self.now,
                    session,
                    event,
                });
            }

            Action::EmitViewerControl {
                session,
                viewer_count,
                request_controls,
            } => {
                self.viewer_controls
                    .push((self.now, session, viewer_count, request_controls));
            }

            Action::EmitPenaltyProposed { penalty } => {
                self.proposed.push(penalty);
            }

            // Delegated work executes inline in simulation.
            Action::PersistPenalty { penalty } => {
                self.stats.persist_attempts += 1;
                let ok = !self.fail_persistence;
                if ok {
                    self.persisted.push(penalty.clone());
                } else {
                    self.stats.persist_failures += 1;
                    warn!(penalty = %penalty.id, "injected persistence failure");
                }
                self.schedule_event(
                    self.now,
                    Event::PenaltyPersisted {
                        penalty: penalty.id,
                        ok,
                    },
                );
            }

            Action::FetchActiveRulebook => match &self.stored_rulebook {
                Some(rulebook) => {
                    let event = Event::RulebookLoaded {
                        rulebook: Arc::new(rulebook.clone()),
                    };
                    self.schedule_event(self.now, event);
                }
                None => debug!("no stored rulebook to load"),
            },
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn machine(&self) -> &RaceControlStateMachine {
        &self.machine
    }

    pub fn live_emissions(&self) -> &[RecordedEmission] {
        &self.live
    }

    pub fn broadcast_emissions(&self) -> &[RecordedEmission] {
        &self.broadcast
    }

    pub fn viewer_controls(&self) -> &[(Duration, SessionId, usize, bool)] {
        &self.viewer_controls
    }

    pub fn proposed_penalties(&self) -> &[Penalty] {
        &self.proposed
    }

    pub fn persisted_penalties(&self) -> &[Penalty] {
        &self.persisted
    }
}

impl Default for SimulationRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::BroadcastFlush => Event::BroadcastFlushTimer,
    }
}
