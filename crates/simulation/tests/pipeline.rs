//! End-to-end pipeline tests on the virtual clock.

use std::time::Duration;

use racecontrol_core::Event;
use racecontrol_simulation::{RecordedEmission, SimulationRunner};
use racecontrol_types::test_utils::test_trigger;
use racecontrol_types::{
    CompareOp, Condition, IncidentTrigger, PenaltyKind, PenaltyTemplate, RaceFlag, Rule, Rulebook,
    Session, SessionId, SessionPhase, SessionStatus, TriggerKind, TriggerPayload,
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn contact_rulebook() -> Rulebook {
    Rulebook {
        id: "league-gt3".to_string(),
        version: 1,
        rules: vec![Rule {
            reference: "SC-3.2.1".to_string(),
            title: "Causing a collision".to_string(),
            condition: Condition::Compare {
                field: "has_contact".to_string(),
                op: CompareOp::Eq,
                value: 1.0,
            },
            penalty: PenaltyTemplate {
                kind: PenaltyKind::TimePenalty,
                value: 5.0,
                points: 2,
            },
            priority: 10,
            is_active: true,
        }],
    }
}

fn session() -> Session {
    Session {
        id: SessionId(1),
        external_id: "sim-1".to_string(),
        status: SessionStatus::Active,
        track_name: "spa".to_string(),
        flag: RaceFlag::Green,
        phase: SessionPhase::Racing,
    }
}

fn rear_end_trigger(timestamp_ms: u64) -> IncidentTrigger {
    let mut trigger = test_trigger(
        TriggerKind::SuddenDeceleration,
        TriggerPayload::SuddenDeceleration { speed_loss: 0.4 },
        1,
        &[2],
    );
    trigger.timestamp_ms = timestamp_ms;
    trigger.context.speed_differential = Some(18.0);
    trigger.context.current_speed = Some(45.0);
    trigger
}

/// Runner with an installed rulebook and one started session.
fn started_runner() -> SimulationRunner {
    let mut runner = SimulationRunner::with_rulebook(Some(contact_rulebook()));
    runner.initialize();
    runner.schedule_at(ms(0), Event::SessionStarted { session: session() });
    runner
}

fn named<'a>(emissions: &'a [RecordedEmission], name: &str) -> Vec<&'a RecordedEmission> {
    emissions
        .iter()
        .filter(|e| e.event.name == name)
        .collect()
}

#[test]
fn delayed_incident_releases_after_the_recorded_delay() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(0),
        Event::SetDelayCommand {
            session: SessionId(1),
            delay_ms: 30_000,
        },
    );
    runner.schedule_at(
        ms(5_000),
        Event::IncidentTriggerReceived {
            trigger: rear_end_trigger(5_000),
        },
    );
    runner.run_until(ms(120_000));

    // Officials saw it immediately.
    let live = named(runner.live_emissions(), "incident:classified");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].time, ms(5_000));

    // The public copy waited out the full delay, released by the next tick.
    let broadcast = named(runner.broadcast_emissions(), "incident:classified");
    assert_eq!(broadcast.len(), 1);
    assert!(broadcast[0].time >= ms(35_000));
    assert!(broadcast[0].time < ms(35_200));
}

#[test]
fn broadcast_preserves_enqueue_order() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(0),
        Event::SetDelayCommand {
            session: SessionId(1),
            delay_ms: 10_000,
        },
    );
    for t in [5_000u64, 6_000, 7_000] {
        runner.schedule_at(
            ms(t),
            Event::IncidentTriggerReceived {
                trigger: rear_end_trigger(t),
            },
        );
    }
    runner.run_until(ms(60_000));

    let ids: Vec<u64> = named(runner.broadcast_emissions(), "incident:classified")
        .iter()
        .map(|e| e.event.payload["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, [1, 2, 3]);

    // Release times honor each event's own enqueue time.
    let times: Vec<Duration> = named(runner.broadcast_emissions(), "incident:classified")
        .iter()
        .map(|e| e.time)
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert!(times[0] >= ms(15_000));
}

#[test]
fn netcode_artifact_produces_no_penalty() {
    let mut runner = started_runner();
    let mut trigger = test_trigger(
        TriggerKind::ContactReported,
        TriggerPayload::ContactSensor { incident_delta: 1 },
        1,
        &[2],
    );
    trigger.context.speed_differential = Some(2.0);
    runner.schedule_at(ms(1_000), Event::IncidentTriggerReceived { trigger });
    runner.run_until(ms(10_000));

    let live = named(runner.live_emissions(), "incident:classified");
    assert_eq!(live.len(), 1);
    assert_eq!(
        live[0].event.payload["contact"]["contactType"],
        "netcode_likely"
    );
    assert!(runner.proposed_penalties().is_empty());
    assert!(runner.persisted_penalties().is_empty());
}

#[test]
fn delay_change_never_applies_retroactively() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(0),
        Event::SetDelayCommand {
            session: SessionId(1),
            delay_ms: 60_000,
        },
    );
    runner.schedule_at(
        ms(1_000),
        Event::IncidentTriggerReceived {
            trigger: rear_end_trigger(1_000),
        },
    );
    // Director drops the delay after the event is already queued.
    runner.schedule_at(
        ms(2_000),
        Event::SetDelayCommand {
            session: SessionId(1),
            delay_ms: 10_000,
        },
    );
    runner.run_until(ms(180_000));

    let broadcast = named(runner.broadcast_emissions(), "incident:classified");
    assert_eq!(broadcast.len(), 1);
    assert!(broadcast[0].time >= ms(61_000));
}

#[test]
fn session_end_discards_undelivered_broadcasts() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(0),
        Event::SetDelayCommand {
            session: SessionId(1),
            delay_ms: 30_000,
        },
    );
    runner.schedule_at(
        ms(5_000),
        Event::IncidentTriggerReceived {
            trigger: rear_end_trigger(5_000),
        },
    );
    runner.schedule_at(
        ms(10_000),
        Event::SessionStatusChanged {
            session: SessionId(1),
            status: SessionStatus::Finished,
        },
    );
    runner.run_until(ms(300_000));

    // The queued incident never reaches the public channel.
    assert!(named(runner.broadcast_emissions(), "incident:classified").is_empty());
    // Officials still saw both the incident and the session end.
    assert_eq!(named(runner.live_emissions(), "incident:classified").len(), 1);
    assert!(!named(runner.live_emissions(), "session:status").is_empty());
}

#[test]
fn persistence_failure_is_isolated_per_penalty() {
    let mut runner = started_runner();
    runner.fail_persistence(true);
    for t in [1_000u64, 2_000] {
        runner.schedule_at(
            ms(t),
            Event::IncidentTriggerReceived {
                trigger: rear_end_trigger(t),
            },
        );
    }
    runner.run_until(ms(10_000));

    // Both penalties were proposed and distributed despite the store.
    assert_eq!(runner.proposed_penalties().len(), 2);
    assert_eq!(runner.persisted_penalties().len(), 0);
    assert_eq!(runner.stats().persist_attempts, 2);
    assert_eq!(runner.stats().persist_failures, 2);
    assert_eq!(named(runner.live_emissions(), "penalty:proposed").len(), 2);
    assert_eq!(
        named(runner.live_emissions(), "incident:classified").len(),
        2
    );
}

#[test]
fn broadcast_payloads_are_redacted_live_payloads_are_not() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(1_000),
        Event::IncidentTriggerReceived {
            trigger: rear_end_trigger(1_000),
        },
    );
    runner.run_until(ms(10_000));

    let live = named(runner.live_emissions(), "incident:classified");
    let broadcast = named(runner.broadcast_emissions(), "incident:classified");
    assert_eq!(live.len(), 1);
    assert_eq!(broadcast.len(), 1);

    // The AI analysis slot is official-eyes-only, even when empty.
    assert!(live[0].event.payload.get("aiAnalysis").is_some());
    assert!(broadcast[0].event.payload.get("aiAnalysis").is_none());
    // Classification itself is public.
    assert_eq!(
        broadcast[0].event.payload["contact"]["contactType"],
        "rear_end"
    );
}

#[test]
fn viewer_joins_drive_fidelity_control_signals() {
    let mut runner = started_runner();
    runner.schedule_at(
        ms(1_000),
        Event::ViewerJoined {
            session: SessionId(1),
            viewer: "viewer-a".to_string(),
            is_relay: false,
        },
    );
    runner.schedule_at(
        ms(2_000),
        Event::ViewerJoined {
            session: SessionId(1),
            viewer: "relay-1".to_string(),
            is_relay: true,
        },
    );
    runner.schedule_at(
        ms(3_000),
        Event::ViewerLeft {
            session: SessionId(1),
            viewer: "viewer-a".to_string(),
        },
    );
    runner.run_until(ms(10_000));

    let controls = runner.viewer_controls();
    assert_eq!(controls.len(), 2);
    assert_eq!((controls[0].2, controls[0].3), (1, true));
    assert_eq!((controls[1].2, controls[1].3), (0, false));
}

#[test]
fn identical_inputs_produce_identical_runs() {
    let run = |fail: bool| {
        let mut runner = started_runner();
        runner.fail_persistence(fail);
        runner.schedule_at(
            ms(0),
            Event::SetDelayCommand {
                session: SessionId(1),
                delay_ms: 10_000,
            },
        );
        for t in [1_000u64, 2_500, 4_000] {
            runner.schedule_at(
                ms(t),
                Event::IncidentTriggerReceived {
                    trigger: rear_end_trigger(t),
                },
            );
        }
        runner.run_until(ms(60_000));
        let timeline: Vec<(Duration, String)> = runner
            .broadcast_emissions()
            .iter()
            .map(|e| (e.time, e.event.name.clone()))
            .collect();
        (runner.stats().events_processed, timeline)
    };

    let a = run(false);
    let b = run(false);
    assert_eq!(a, b);
}
