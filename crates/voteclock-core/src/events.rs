use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{ElectionState, SessionState};

/// Every state change in the engine produces an Event.
/// The presentation layer renders them; timestamps come from the engine's clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ElectionStateChanged {
        election_id: String,
        from: ElectionState,
        to: ElectionState,
        at: DateTime<Utc>,
    },
    /// Per-election view, emitted on request rather than on change.
    ElectionSnapshot {
        election_id: String,
        state: ElectionState,
        remaining_ms: i64,
        countdown: String,
        at: DateTime<Utc>,
    },
    SessionStarted {
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Entered the prompt window; the user should be asked to extend.
    SessionPrompted {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    SessionExtended {
        from: SessionState,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Session ended. `signed_out` is false when the auth service failed.
    SessionExpired {
        signed_out: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::ElectionStateChanged { at, .. }
            | Event::ElectionSnapshot { at, .. }
            | Event::SessionStarted { at, .. }
            | Event::SessionPrompted { at, .. }
            | Event::SessionExtended { at, .. }
            | Event::SessionExpired { at, .. } => *at,
        }
    }
}
