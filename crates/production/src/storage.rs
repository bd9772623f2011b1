//! # Stewarding stores
//!
//! Production storage for rulebooks and penalties.
//!
//! All operations are synchronous blocking I/O. Callers in async contexts
//! should use `spawn_blocking` to avoid blocking the runtime; the runner
//! does this for every delegated store action.

use parking_lot::Mutex;
use racecontrol_types::{Penalty, PenaltyId, PenaltyStatus, Rulebook};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown penalty: {0}")]
    UnknownPenalty(PenaltyId),
}

/// Read access to rulebook documents.
///
/// The engine never touches storage directly; the runner fetches through
/// this trait and feeds the result back as an event.
pub trait RulebookStore: Send + Sync {
    /// Load the rulebook currently marked active, if any.
    fn find_active(&self) -> Result<Option<Rulebook>, StoreError>;

    /// Load a specific rulebook by document id.
    fn find_by_id(&self, id: &str) -> Result<Option<Rulebook>, StoreError>;
}

/// Write access for generated penalties.
pub trait PenaltyStore: Send + Sync {
    /// Persist a newly proposed penalty.
    fn create(&self, penalty: &Penalty) -> Result<(), StoreError>;

    /// Update the review status of an existing penalty.
    fn set_status(&self, id: PenaltyId, status: PenaltyStatus) -> Result<(), StoreError>;
}

/// Rulebook store backed by a directory of JSON documents.
///
/// `active.json` holds the rulebook currently in force; other documents are
/// addressable by their `id` field as `<id>.json`. Documents are read fresh
/// on every fetch so an operator can swap the active file without a restart.
pub struct FileRulebookStore {
    dir: PathBuf,
}

impl FileRulebookStore {
    /// File name of the active rulebook document.
    pub const ACTIVE_FILE: &'static str = "active.json";

    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn read_document(&self, name: &str) -> Result<Option<Rulebook>, StoreError> {
        let path = self.dir.join(name);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let rulebook: Rulebook = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), id = %rulebook.id, version = rulebook.version, "Loaded rulebook document");
        Ok(Some(rulebook))
    }
}

impl RulebookStore for FileRulebookStore {
    fn find_active(&self) -> Result<Option<Rulebook>, StoreError> {
        self.read_document(Self::ACTIVE_FILE)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Rulebook>, StoreError> {
        self.read_document(&format!("{id}.json"))
    }
}

/// In-memory penalty store.
///
/// Review tooling reads penalties back out through [`snapshot`]. A durable
/// backend would implement [`PenaltyStore`] against a database; the runner
/// only sees the trait.
///
/// [`snapshot`]: InMemoryPenaltyStore::snapshot
#[derive(Default)]
pub struct InMemoryPenaltyStore {
    penalties: Mutex<HashMap<PenaltyId, Penalty>>,
}

impl InMemoryPenaltyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out all stored penalties, ordered by id.
    pub fn snapshot(&self) -> Vec<Penalty> {
        let guard = self.penalties.lock();
        let mut all: Vec<Penalty> = guard.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        all
    }

    pub fn len(&self) -> usize {
        self.penalties.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.penalties.lock().is_empty()
    }
}

impl PenaltyStore for InMemoryPenaltyStore {
    fn create(&self, penalty: &Penalty) -> Result<(), StoreError> {
        info!(
            penalty = %penalty.id,
            driver = %penalty.driver,
            kind = %penalty.kind,
            "Persisting penalty"
        );
        self.penalties.lock().insert(penalty.id, penalty.clone());
        Ok(())
    }

    fn set_status(&self, id: PenaltyId, status: PenaltyStatus) -> Result<(), StoreError> {
        let mut guard = self.penalties.lock();
        match guard.get_mut(&id) {
            Some(penalty) => {
                penalty.status = status;
                Ok(())
            }
            None => Err(StoreError::UnknownPenalty(id)),
        }
    }
}

/// Shared handles the runner and RPC layer pass around.
pub type SharedRulebookStore = Arc<dyn RulebookStore>;
pub type SharedPenaltyStore = Arc<dyn PenaltyStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use racecontrol_types::{DriverId, IncidentId, PenaltyKind, SessionId};

    fn test_penalty(id: u64) -> Penalty {
        Penalty {
            id: PenaltyId(id),
            session: SessionId(1),
            incident: IncidentId(1),
            driver: DriverId(7),
            kind: PenaltyKind::TimePenalty,
            value: 5.0,
            rule_reference: "SR-4.2".to_string(),
            rationale: "test".to_string(),
            points: 2,
            status: PenaltyStatus::Pending,
        }
    }

    #[test]
    fn missing_active_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRulebookStore::new(dir.path());
        assert!(store.find_active().unwrap().is_none());
    }

    #[test]
    fn active_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let rulebook = Rulebook {
            id: "sprint-2026".to_string(),
            version: 3,
            rules: vec![],
        };
        std::fs::write(
            dir.path().join(FileRulebookStore::ACTIVE_FILE),
            serde_json::to_string(&rulebook).unwrap(),
        )
        .unwrap();

        let store = FileRulebookStore::new(dir.path());
        let loaded = store.find_active().unwrap().unwrap();
        assert_eq!(loaded.id, "sprint-2026");
        assert_eq!(loaded.version, 3);
    }

    #[test]
    fn find_by_id_reads_named_document() {
        let dir = tempfile::tempdir().unwrap();
        let rulebook = Rulebook {
            id: "endurance".to_string(),
            version: 1,
            rules: vec![],
        };
        std::fs::write(
            dir.path().join("endurance.json"),
            serde_json::to_string(&rulebook).unwrap(),
        )
        .unwrap();

        let store = FileRulebookStore::new(dir.path());
        assert!(store.find_by_id("endurance").unwrap().is_some());
        assert!(store.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FileRulebookStore::ACTIVE_FILE), "not json").unwrap();

        let store = FileRulebookStore::new(dir.path());
        assert!(matches!(
            store.find_active(),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn penalty_store_create_and_update() {
        let store = InMemoryPenaltyStore::new();
        store.create(&test_penalty(1)).unwrap();
        store.create(&test_penalty(2)).unwrap();

        store
            .set_status(PenaltyId(1), PenaltyStatus::Approved)
            .unwrap();

        let all = store.snapshot();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, PenaltyStatus::Approved);
        assert_eq!(all[1].status, PenaltyStatus::Pending);
    }

    #[test]
    fn set_status_on_unknown_penalty_fails() {
        let store = InMemoryPenaltyStore::new();
        assert!(matches!(
            store.set_status(PenaltyId(99), PenaltyStatus::Served),
            Err(StoreError::UnknownPenalty(_))
        ));
    }
}
