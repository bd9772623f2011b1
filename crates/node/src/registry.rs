//! In-memory incident and penalty registry.

use std::collections::HashMap;

use racecontrol_types::{
    AiAnalysis, IncidentEvent, IncidentId, IncidentStatus, Penalty, PenaltyId, PenaltyStatus,
    SessionId,
};
use tracing::warn;

/// Classified incidents and proposed penalties, by id.
///
/// Classification fields are immutable once recorded; steward review events
/// mutate only status (and attach late-arriving AI analysis). Durable
/// storage is the runner's concern, this registry exists so review events
/// have something to resolve against.
#[derive(Debug, Default)]
pub struct IncidentRegistry {
    incidents: HashMap<IncidentId, IncidentEvent>,
    penalties: HashMap<PenaltyId, Penalty>,
}

impl IncidentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_incident(&mut self, incident: IncidentEvent) {
        self.incidents.insert(incident.id, incident);
    }

    pub fn record_penalty(&mut self, penalty: Penalty) {
        self.penalties.insert(penalty.id, penalty);
    }

    pub fn incident(&self, id: IncidentId) -> Option<&IncidentEvent> {
        self.incidents.get(&id)
    }

    pub fn penalty(&self, id: PenaltyId) -> Option<&Penalty> {
        self.penalties.get(&id)
    }

    /// Apply a steward review decision. Returns the updated incident.
    pub fn review_incident(
        &mut self,
        id: IncidentId,
        status: IncidentStatus,
    ) -> Option<&IncidentEvent> {
        match self.incidents.get_mut(&id) {
            Some(incident) => {
                incident.status = status;
                Some(incident)
            }
            None => {
                warn!(incident = %id, "review for unknown incident");
                None
            }
        }
    }

    /// Apply a steward review decision. Returns the updated penalty.
    pub fn review_penalty(&mut self, id: PenaltyId, status: PenaltyStatus) -> Option<&Penalty> {
        match self.penalties.get_mut(&id) {
            Some(penalty) => {
                penalty.status = status;
                Some(penalty)
            }
            None => {
                warn!(penalty = %id, "review for unknown penalty");
                None
            }
        }
    }

    /// Attach late-arriving AI analysis to an incident.
    pub fn attach_analysis(
        &mut self,
        id: IncidentId,
        analysis: AiAnalysis,
    ) -> Option<&IncidentEvent> {
        match self.incidents.get_mut(&id) {
            Some(incident) => {
                incident.ai_analysis = Some(analysis);
                Some(incident)
            }
            None => {
                warn!(incident = %id, "AI analysis for unknown incident");
                None
            }
        }
    }

    /// Drop all registry entries belonging to a finished session.
    pub fn teardown_session(&mut self, session: SessionId) {
        self.incidents.retain(|_, i| i.trigger.session != session);
        self.penalties.retain(|_, p| p.session != session);
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.len()
    }
}
