//! Election status tracking.
//!
//! One watcher + one lifecycle cell per election, over a list fetched once.
//! The caller drives [`ElectionStatusTracker::tick`] at its cadence; each
//! election is evaluated independently.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::countdown::CountdownSample;
use crate::deadline::Deadline;
use crate::error::LifecycleError;
use crate::events::Event;
use crate::lifecycle::{ElectionReducer, ElectionSignals, ElectionState, LifecycleCell, Reducer};
use crate::store::ElectionRecord;
use crate::watcher::DeadlineWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: Option<Deadline>,
    pub end: Deadline,
    /// Mirrors the store's `is_active` flag.
    pub externally_active: bool,
}

impl TryFrom<&ElectionRecord> for Election {
    type Error = LifecycleError;

    fn try_from(record: &ElectionRecord) -> Result<Self, Self::Error> {
        let id = record.id.trim();
        if id.is_empty() {
            return Err(LifecycleError::InvalidElectionId(record.id.clone()));
        }
        let end = Deadline::parse(record.end_date.as_deref().unwrap_or_default())?;
        let start = record.start_date.as_deref().map(Deadline::parse).transpose()?;
        Ok(Self {
            id: id.to_string(),
            title: record.title.clone(),
            description: record.description.clone(),
            start,
            end,
            externally_active: record.is_active,
        })
    }
}

/// What the presentation layer renders for one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStatus {
    pub state: ElectionState,
    pub countdown: CountdownSample,
}

#[derive(Debug)]
struct Tracked<C> {
    election: Election,
    cell: LifecycleCell<ElectionState>,
    /// `None` once retired.
    watcher: Option<DeadlineWatcher<C>>,
    last: CountdownSample,
}

#[derive(Debug)]
pub struct ElectionStatusTracker<C> {
    clock: C,
    tick: Duration,
    tracked: Vec<Tracked<C>>,
    /// Transitions observed outside `tick`, handed out on the next one.
    pending: Vec<Event>,
}

impl<C: Clock + Clone> ElectionStatusTracker<C> {
    pub fn new(clock: C, tick: Duration) -> Result<Self, LifecycleError> {
        if tick.is_zero() {
            return Err(LifecycleError::InvalidTick);
        }
        Ok(Self {
            clock,
            tick,
            tracked: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Start tracking `election`, replacing any entry with the same id.
    ///
    /// The initial state is derived immediately and is not reported as a
    /// transition.
    pub fn track(&mut self, election: Election) -> Result<(), LifecycleError> {
        let mut watcher = DeadlineWatcher::new(election.end, self.tick, self.clock.clone())?;
        let Some(first) = watcher.sample() else {
            return Err(LifecycleError::InvalidTick);
        };
        let signals = ElectionSignals::new(
            self.clock.now(),
            election.start,
            &first,
            election.externally_active,
        );
        let initial = ElectionReducer.reduce(ElectionState::Upcoming, &signals);
        tracing::debug!(election_id = %election.id, state = %initial, "tracking election");

        let mut entry = Tracked {
            election,
            cell: LifecycleCell::new(initial),
            watcher: Some(watcher),
            last: first,
        };
        retire_if_settled(&mut entry);

        self.untrack(&entry.election.id);
        self.tracked.push(entry);
        Ok(())
    }

    /// Track every valid record; invalid ones are skipped and returned.
    pub fn track_records(&mut self, records: &[ElectionRecord]) -> Vec<LifecycleError> {
        let mut rejected = Vec::new();
        for record in records {
            let result = Election::try_from(record).and_then(|election| self.track(election));
            if let Err(err) = result {
                tracing::warn!(election_id = %record.id, %err, "skipping election record");
                rejected.push(err);
            }
        }
        rejected
    }

    pub fn untrack(&mut self, id: &str) -> Option<Election> {
        let idx = self.position(id)?;
        let mut entry = self.tracked.remove(idx);
        if let Some(watcher) = entry.watcher.as_mut() {
            watcher.cancel();
        }
        Some(entry.election)
    }

    /// Re-evaluate every election and return the transitions observed.
    pub fn tick(&mut self) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.pending);
        for idx in 0..self.tracked.len() {
            if let Some(event) = self.refresh(idx) {
                events.push(event);
            }
        }
        events
    }

    /// Refuse a vote unless the election is open right now.
    ///
    /// Samples the clock instead of trusting the last tick, so a vote racing
    /// the deadline is decided by the deadline.
    pub fn ensure_open(&mut self, id: &str) -> Result<(), LifecycleError> {
        let idx = self
            .position(id)
            .ok_or_else(|| LifecycleError::ElectionNotTracked(id.to_string()))?;
        if let Some(event) = self.refresh(idx) {
            self.pending.push(event);
        }
        match self.tracked[idx].cell.state() {
            ElectionState::Active => Ok(()),
            state => Err(LifecycleError::VotingClosed {
                id: id.to_string(),
                state,
            }),
        }
    }

    pub fn status(&self, id: &str) -> Option<ElectionStatus> {
        self.position(id).map(|idx| status_of(&self.tracked[idx]))
    }

    pub fn statuses(&self) -> impl Iterator<Item = (&Election, ElectionStatus)> {
        self.tracked.iter().map(|t| (&t.election, status_of(t)))
    }

    /// Elections currently open for voting, in fetch order.
    pub fn visible_active(&self) -> Vec<&Election> {
        self.tracked
            .iter()
            .filter(|t| t.cell.state() == ElectionState::Active)
            .map(|t| &t.election)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        let at = self.clock.now();
        self.tracked
            .iter()
            .map(|t| Event::ElectionSnapshot {
                election_id: t.election.id.clone(),
                state: t.cell.state(),
                remaining_ms: t.last.remaining_ms,
                countdown: t.last.formatted.clone(),
                at,
            })
            .collect()
    }

    pub fn election(&self, id: &str) -> Option<&Election> {
        self.position(id).map(|idx| &self.tracked[idx].election)
    }

    /// Elections whose watcher is still ticking.
    pub fn live_watchers(&self) -> usize {
        self.tracked.iter().filter(|t| t.watcher.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tracked.iter().position(|t| t.election.id == id)
    }

    fn refresh(&mut self, idx: usize) -> Option<Event> {
        let now = self.clock.now();
        let entry = &mut self.tracked[idx];
        let sample = entry.watcher.as_mut()?.sample()?;
        let signals = ElectionSignals::new(
            now,
            entry.election.start,
            &sample,
            entry.election.externally_active,
        );
        entry.last = sample;
        let transition = entry.cell.step(&ElectionReducer, &signals);
        retire_if_settled(entry);

        transition.map(|t| Event::ElectionStateChanged {
            election_id: entry.election.id.clone(),
            from: t.from,
            to: t.to,
            at: now,
        })
    }
}

fn status_of<C>(entry: &Tracked<C>) -> ElectionStatus {
    ElectionStatus {
        state: entry.cell.state(),
        countdown: entry.last.clone(),
    }
}

/// Drop the watcher once neither the state nor the countdown can change.
fn retire_if_settled<C: Clock>(entry: &mut Tracked<C>) {
    if entry.cell.state() != ElectionState::Completed || !entry.last.elapsed {
        return;
    }
    if let Some(mut watcher) = entry.watcher.take() {
        watcher.cancel();
        tracing::debug!(election_id = %entry.election.id, "retired election watcher");
    }
}
