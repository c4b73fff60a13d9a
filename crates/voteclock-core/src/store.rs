//! External collaborators.
//!
//! The engine reads elections and candidates once as a snapshot and asks an
//! auth service to sign the user out. Both are traits; [`JsonSnapshotStore`]
//! and [`RecordingAuth`] are the in-tree implementations used by the CLI and
//! the tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, StoreError};

/// An election row as the store returns it. Deadlines are unparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub position: String,
}

/// Candidates standing for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub title: String,
    pub candidates: Vec<Candidate>,
}

/// Group candidates by position title, positions in first-seen order.
pub fn group_by_position(candidates: Vec<Candidate>) -> Vec<Position> {
    let mut positions: Vec<Position> = Vec::new();
    for candidate in candidates {
        match positions.iter_mut().find(|p| p.title == candidate.position) {
            Some(position) => position.candidates.push(candidate),
            None => positions.push(Position {
                title: candidate.position.clone(),
                candidates: vec![candidate],
            }),
        }
    }
    positions
}

pub trait ElectionStore {
    fn fetch_elections(&self) -> Result<Vec<ElectionRecord>, StoreError>;

    fn fetch_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, StoreError>;
}

pub trait AuthService: Send + Sync {
    fn sign_out(&self) -> Result<(), AuthError>;
}

impl<A: AuthService + ?Sized> AuthService for Arc<A> {
    fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CandidateRow {
    id: String,
    name: String,
    position: String,
    election_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    elections: Vec<ElectionRecord>,
    #[serde(default)]
    candidates: Vec<CandidateRow>,
}

/// Store backed by one JSON document:
///
/// ```json
/// { "elections": [{ "id": "e1", "title": "...", "end_date": "2026-11-03T20:00:00Z", "is_active": true }],
///   "candidates": [{ "id": "c1", "name": "...", "position": "Chair", "election_id": "e1" }] }
/// ```
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
    snapshot: Snapshot,
}

impl JsonSnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_json(path, &content)
    }

    fn from_json(path: PathBuf, content: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        tracing::debug!(
            path = %path.display(),
            elections = snapshot.elections.len(),
            candidates = snapshot.candidates.len(),
            "loaded election snapshot"
        );
        Ok(Self { path, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ElectionStore for JsonSnapshotStore {
    fn fetch_elections(&self) -> Result<Vec<ElectionRecord>, StoreError> {
        Ok(self.snapshot.elections.clone())
    }

    fn fetch_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, StoreError> {
        if !self.snapshot.elections.iter().any(|e| e.id == election_id) {
            return Err(StoreError::UnknownElection(election_id.to_string()));
        }
        Ok(self
            .snapshot
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .map(|c| Candidate {
                id: c.id.clone(),
                name: c.name.clone(),
                position: c.position.clone(),
            })
            .collect())
    }
}

/// Auth service that counts sign-out calls. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuth {
    calls: Arc<AtomicUsize>,
    failure: Option<AuthError>,
}

impl RecordingAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sign-out is counted and then fails with `error`.
    pub fn failing(error: AuthError) -> Self {
        Self {
            calls: Arc::default(),
            failure: Some(error),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuthService for RecordingAuth {
    fn sign_out(&self) -> Result<(), AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "elections": [
            { "id": "e1", "title": "Council", "end_date": "2026-11-03T20:00:00Z", "is_active": true },
            { "id": "e2", "title": "Budget", "description": "FY27", "end_date": "2026-12-01" }
        ],
        "candidates": [
            { "id": "c1", "name": "Ada", "position": "Chair", "election_id": "e1" },
            { "id": "c2", "name": "Grace", "position": "Treasurer", "election_id": "e1" },
            { "id": "c3", "name": "Linus", "position": "Chair", "election_id": "e1" },
            { "id": "c4", "name": "Barbara", "position": "Chair", "election_id": "e2" }
        ]
    }"#;

    fn store() -> JsonSnapshotStore {
        JsonSnapshotStore::from_json(PathBuf::from("inline.json"), SNAPSHOT).unwrap()
    }

    #[test]
    fn reads_elections_with_defaults() {
        let elections = store().fetch_elections().unwrap();
        assert_eq!(elections.len(), 2);
        assert!(elections[0].is_active);
        assert!(!elections[1].is_active);
        assert_eq!(elections[1].description, "FY27");
        assert_eq!(elections[0].start_date, None);
    }

    #[test]
    fn candidates_are_scoped_and_grouped() {
        let candidates = store().fetch_candidates("e1").unwrap();
        assert_eq!(candidates.len(), 3);

        let positions = group_by_position(candidates);
        let titles: Vec<&str> = positions.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Chair", "Treasurer"]);
        let chair: Vec<&str> = positions[0].candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(chair, vec!["Ada", "Linus"]);
    }

    #[test]
    fn unknown_election_is_an_error() {
        assert!(matches!(
            store().fetch_candidates("nope"),
            Err(StoreError::UnknownElection(_))
        ));
    }

    #[test]
    fn opens_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        let store = JsonSnapshotStore::open(file.path()).unwrap();
        assert_eq!(store.fetch_elections().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = JsonSnapshotStore::open("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn recording_auth_counts_and_fails_on_request() {
        let ok = RecordingAuth::new();
        ok.sign_out().unwrap();
        assert_eq!(ok.calls(), 1);

        let bad = RecordingAuth::failing(AuthError::Unavailable);
        assert_eq!(bad.sign_out(), Err(AuthError::Unavailable));
        assert_eq!(bad.calls(), 1);
    }
}
