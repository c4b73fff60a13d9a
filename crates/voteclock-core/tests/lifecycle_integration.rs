//! End-to-end tests across store, tracker and session guard.
//!
//! Everything runs on a `ManualClock` so timing is exact.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use voteclock_core::store::{group_by_position, RecordingAuth};
use voteclock_core::{
    CountdownSample, ElectionState, ElectionStatusTracker, ElectionStore, Event,
    JsonSnapshotStore, LifecycleError, ManualClock, SessionConfig, SessionGuard, SessionState,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 3, 8, 0, 0).unwrap()
}

fn write_snapshot() -> tempfile::NamedTempFile {
    let snapshot = serde_json::json!({
        "elections": [
            { "id": "council", "title": "City Council", "end_date": "2026-11-03T09:01:01Z", "is_active": true },
            { "id": "budget", "title": "Budget", "end_date": "2026-11-03T07:59:59Z", "is_active": true },
            { "id": "board", "title": "School Board", "start_date": "2026-11-03T08:00:10Z",
              "end_date": "2026-11-03T08:00:20Z", "is_active": true },
            { "id": "archived", "title": "Old Referendum", "end_date": "2026-12-01T00:00:00Z", "is_active": false },
            { "id": "", "title": "Broken row", "end_date": "2026-12-01T00:00:00Z", "is_active": true }
        ],
        "candidates": [
            { "id": "c1", "name": "Ada", "position": "Mayor", "election_id": "council" },
            { "id": "c2", "name": "Grace", "position": "Clerk", "election_id": "council" },
            { "id": "c3", "name": "Alan", "position": "Mayor", "election_id": "council" }
        ]
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(snapshot.to_string().as_bytes()).unwrap();
    file
}

fn tracker_from_snapshot(clock: &ManualClock) -> ElectionStatusTracker<ManualClock> {
    let file = write_snapshot();
    let store = JsonSnapshotStore::open(file.path()).unwrap();
    let mut tracker = ElectionStatusTracker::new(clock.clone(), Duration::from_secs(1)).unwrap();
    let rejected = tracker.track_records(&store.fetch_elections().unwrap());
    assert_eq!(rejected.len(), 1);
    assert!(matches!(rejected[0], LifecycleError::InvalidElectionId(_)));
    tracker
}

// ============================================================================
// Election tracking
// ============================================================================

#[test]
fn snapshot_statuses_at_load() {
    let clock = ManualClock::new(t0());
    let tracker = tracker_from_snapshot(&clock);

    let council = tracker.status("council").unwrap();
    assert_eq!(council.state, ElectionState::Active);
    assert_eq!(council.countdown.formatted, "0d 1h 1m 1s");

    let budget = tracker.status("budget").unwrap();
    assert_eq!(budget.state, ElectionState::Completed);
    assert_eq!(budget.countdown.formatted, "Ended");

    assert_eq!(tracker.status("board").unwrap().state, ElectionState::Upcoming);
    assert_eq!(tracker.status("archived").unwrap().state, ElectionState::Completed);

    let visible: Vec<&str> = tracker.visible_active().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(visible, vec!["council"]);
}

#[test]
fn board_opens_and_closes_with_one_event_each() {
    let clock = ManualClock::new(t0());
    let mut tracker = tracker_from_snapshot(&clock);

    let mut board_events = Vec::new();
    for _ in 0..30 {
        clock.advance_ms(1_000);
        board_events.extend(tracker.tick().into_iter().filter(|e| {
            matches!(e, Event::ElectionStateChanged { election_id, .. } if election_id == "board")
        }));
    }

    let transitions: Vec<(ElectionState, ElectionState)> = board_events
        .iter()
        .map(|e| match e {
            Event::ElectionStateChanged { from, to, .. } => (*from, *to),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (ElectionState::Upcoming, ElectionState::Active),
            (ElectionState::Active, ElectionState::Completed),
        ]
    );
}

#[test]
fn vote_in_flight_at_deadline_is_refused() {
    let clock = ManualClock::new(t0());
    let mut tracker = tracker_from_snapshot(&clock);
    assert!(tracker.ensure_open("council").is_ok());

    clock.advance_ms(3_661_000);
    assert!(matches!(
        tracker.ensure_open("council"),
        Err(LifecycleError::VotingClosed { .. })
    ));
    assert!(tracker.visible_active().is_empty());
}

#[test]
fn candidates_group_for_ballot() {
    let file = write_snapshot();
    let store = JsonSnapshotStore::open(file.path()).unwrap();
    let positions = group_by_position(store.fetch_candidates("council").unwrap());
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].title, "Mayor");
    assert_eq!(positions[0].candidates.len(), 2);
}

// ============================================================================
// Session guard
// ============================================================================

#[test]
fn session_scenario_with_extension() {
    let clock = ManualClock::new(t0());
    let auth = RecordingAuth::new();
    let config = SessionConfig::new(Duration::from_millis(300_000), Duration::from_millis(30_000));
    let mut guard = SessionGuard::start(clock.clone(), config, auth.clone()).unwrap();

    let mut events = Vec::new();
    for second in 1..=900 {
        clock.advance_ms(1_000);
        if second == 275 {
            assert_eq!(guard.state(), SessionState::PromptingExpiry);
            events.extend(guard.extend().unwrap());
            assert_eq!(guard.state(), SessionState::Running);
        }
        events.extend(guard.tick().unwrap());
    }

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            Event::SessionPrompted { .. } => "prompted",
            Event::SessionExtended { .. } => "extended",
            Event::SessionExpired { .. } => "expired",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["prompted", "extended", "prompted", "expired"]);
    assert_eq!(
        events.last().unwrap().at(),
        t0() + chrono::Duration::milliseconds(275_000 + 300_000)
    );
    assert_eq!(auth.calls(), 1);
    assert_eq!(guard.state(), SessionState::Expired);
}

#[test]
fn countdown_sample_matches_formatter_everywhere() {
    // The election list, the detail page and the session prompt share one formatter.
    let sample = CountdownSample::from_remaining_ms(3_661_000);
    assert_eq!(sample.formatted, "0d 1h 1m 1s");
    assert_eq!(CountdownSample::from_remaining_ms(-5).formatted, "Ended");
}
