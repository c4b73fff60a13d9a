use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use serde::Serialize;
use voteclock_core::store::group_by_position;
use voteclock_core::{
    Clock, Config, ElectionState, ElectionStatusTracker, ElectionStore, JsonSnapshotStore,
    SystemClock,
};

use super::{print_json, runtime};

#[derive(Subcommand)]
pub enum ElectionsAction {
    /// Print state and countdown for every election
    Status {
        /// Store snapshot (JSON)
        #[arg(long)]
        file: PathBuf,
        /// Only elections open for voting
        #[arg(long)]
        active: bool,
    },
    /// Tick the tracker and print transitions as they happen
    Watch {
        #[arg(long)]
        file: PathBuf,
        /// Stop after this many ticks (runs until all elections settle if omitted)
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Candidates of one election, grouped by position
    Candidates {
        #[arg(long)]
        file: PathBuf,
        id: String,
    },
    /// Check whether a ballot for this election would be accepted now
    CanVote {
        #[arg(long)]
        file: PathBuf,
        id: String,
    },
}

#[derive(Serialize)]
struct StatusRow<'a> {
    id: &'a str,
    title: &'a str,
    state: ElectionState,
    countdown: &'a str,
    remaining_ms: i64,
}

fn load_tracker<C: Clock + Clone>(
    file: &Path,
    clock: C,
    tick: Duration,
) -> Result<ElectionStatusTracker<C>, Box<dyn std::error::Error>> {
    let store = JsonSnapshotStore::open(file)?;
    let mut tracker = ElectionStatusTracker::new(clock, tick)?;
    let rejected = tracker.track_records(&store.fetch_elections()?);
    for err in rejected {
        eprintln!("skipped: {err}");
    }
    Ok(tracker)
}

pub fn run(action: ElectionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let tick = Config::load_or_default().tick_interval();

    match action {
        ElectionsAction::Status { file, active } => {
            let tracker = load_tracker(&file, SystemClock, tick)?;
            let statuses: Vec<_> = tracker.statuses().collect();
            let rows: Vec<StatusRow<'_>> = statuses
                .iter()
                .filter(|(_, status)| !active || status.state == ElectionState::Active)
                .map(|(election, status)| StatusRow {
                    id: &election.id,
                    title: &election.title,
                    state: status.state,
                    countdown: &status.countdown.formatted,
                    remaining_ms: status.countdown.remaining_ms,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ElectionsAction::Watch { file, ticks } => {
            let mut tracker = load_tracker(&file, SystemClock, tick)?;
            for event in tracker.snapshot() {
                print_json(&event)?;
            }
            runtime()?.block_on(async move {
                let mut interval = tokio::time::interval(tick);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // The first tick fires immediately; the snapshot above covers it.
                interval.tick().await;
                let mut done = 0;
                while ticks.map_or(true, |limit| done < limit) && tracker.live_watchers() > 0 {
                    interval.tick().await;
                    for event in tracker.tick() {
                        print_json(&event)?;
                    }
                    done += 1;
                }
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
        }
        ElectionsAction::Candidates { file, id } => {
            let store = JsonSnapshotStore::open(&file)?;
            let positions = group_by_position(store.fetch_candidates(&id)?);
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
        ElectionsAction::CanVote { file, id } => {
            let mut tracker = load_tracker(&file, SystemClock, tick)?;
            tracker.ensure_open(&id)?;
            println!("{{\"id\": {}, \"open\": true}}", serde_json::to_string(&id)?);
        }
    }
    Ok(())
}
