//! Per-session roster and telemetry bookkeeping.

use std::collections::HashMap;
use std::time::Duration;

use racecontrol_classifier::DriverObservation;
use racecontrol_core::SubStateMachine;
use racecontrol_types::{
    DriverId, DriverTelemetry, RaceFlag, Session, SessionId, SessionPhase, SessionStatus,
};
use tracing::{debug, info, warn};

/// Per-driver derived state, updated each telemetry frame.
#[derive(Debug, Clone)]
struct DriverState {
    telemetry: DriverTelemetry,
    /// Fraction of speed lost between the last two frames, 0 when gaining.
    speed_drop: f64,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    drivers: HashMap<DriverId, DriverState>,
    #[allow(dead_code)]
    started_at: Duration,
}

/// Tracks all live sessions in one process.
///
/// Access is serialized through the owning state machine, so plain
/// `HashMap`s suffice. A terminal status removes the entry; the caller is
/// responsible for tearing down dependent per-session state.
pub struct SessionTracker {
    sessions: HashMap<SessionId, SessionEntry>,
    now: Duration,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            now: Duration::ZERO,
        }
    }

    /// Register a new session. A duplicate start overwrites the old entry,
    /// which only happens when the relay reconnects mid-session.
    pub fn on_session_started(&mut self, session: Session) {
        info!(session = %session.id, track = %session.track_name, "session started");
        if self
            .sessions
            .insert(session.id, SessionEntry {
                session,
                drivers: HashMap::new(),
                started_at: self.now,
            })
            .is_some()
        {
            warn!("session restarted, previous roster dropped");
        }
    }

    /// Apply a lifecycle transition. Returns true if the session reached a
    /// terminal status and was removed.
    pub fn on_status_changed(&mut self, id: SessionId, status: SessionStatus) -> bool {
        let Some(entry) = self.sessions.get_mut(&id) else {
            warn!(session = %id, %status, "status change for unknown session");
            return false;
        };
        debug!(session = %id, from = %entry.session.status, to = %status, "session status");
        entry.session.status = status;
        if status.is_terminal() {
            self.sessions.remove(&id);
            return true;
        }
        false
    }

    /// Apply a batch of telemetry frames, updating last-value snapshots and
    /// per-driver speed-drop observations.
    pub fn on_telemetry(&mut self, id: SessionId, frames: Vec<(DriverId, DriverTelemetry)>) {
        let Some(entry) = self.sessions.get_mut(&id) else {
            return;
        };
        for (driver, telemetry) in frames {
            let speed_drop = entry
                .drivers
                .get(&driver)
                .map(|prev| speed_drop(prev.telemetry.speed, telemetry.speed))
                .unwrap_or(0.0);
            entry.drivers.insert(
                driver,
                DriverState {
                    telemetry,
                    speed_drop,
                },
            );
        }
    }

    /// Track the flag state reported by the relay.
    pub fn on_flag_changed(&mut self, id: SessionId, flag: RaceFlag, phase: SessionPhase) {
        if let Some(entry) = self.sessions.get_mut(&id) {
            debug!(session = %id, ?flag, ?phase, "flag changed");
            entry.session.flag = flag;
            entry.session.phase = phase;
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id).map(|e| &e.session)
    }

    /// Last known speed for a driver, m/s.
    pub fn last_speed(&self, id: SessionId, driver: DriverId) -> Option<f64> {
        self.sessions
            .get(&id)?
            .drivers
            .get(&driver)
            .map(|d| d.telemetry.speed)
    }

    /// Speed-drop observations for the given drivers, for responsibility
    /// prediction. Drivers without telemetry carry a zero observation.
    pub fn observations(&self, id: SessionId, drivers: &[DriverId]) -> Vec<DriverObservation> {
        let entry = self.sessions.get(&id);
        drivers
            .iter()
            .map(|&driver| DriverObservation {
                driver,
                speed_loss: entry
                    .and_then(|e| e.drivers.get(&driver))
                    .map(|d| d.speed_drop)
                    .unwrap_or(0.0),
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SubStateMachine for SessionTracker {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }
}

/// Fraction of speed lost between two frames. Zero when gaining speed or
/// when the previous speed is too small to divide by.
fn speed_drop(previous: f64, current: f64) -> f64 {
    if previous <= 1.0 {
        return 0.0;
    }
    ((previous - current) / previous).max(0.0)
}
