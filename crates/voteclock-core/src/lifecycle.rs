//! Lifecycle states and reducers.
//!
//! ## State Transitions
//!
//! ```text
//! Election: Upcoming -> Active -> Completed
//! Session:  Running -> PromptingExpiry -> Expired
//! ```
//!
//! Reducers are pure and level-based: given the current state and the latest
//! signals they return the state those signals justify, never one behind the
//! current state. [`LifecycleCell`] owns the current state and reports a
//! [`Transition`] only when the state actually changes, so effects hang off
//! edges instead of being re-fired on every tick.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::CountdownSample;
use crate::deadline::Deadline;
use crate::error::LifecycleError;

/// A forward-only lifecycle. Declaration order is the only legal direction.
pub trait LifecycleState: Copy + Eq + Ord + fmt::Debug + fmt::Display {
    fn is_terminal(self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    Upcoming,
    Active,
    Completed,
}

impl LifecycleState for ElectionState {
    fn is_terminal(self) -> bool {
        self == ElectionState::Completed
    }
}

impl fmt::Display for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElectionState::Upcoming => "Upcoming",
            ElectionState::Active => "Active",
            ElectionState::Completed => "Completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    /// Inside the prompt window; the user is being asked to extend.
    PromptingExpiry,
    Expired,
}

impl LifecycleState for SessionState {
    fn is_terminal(self) -> bool {
        self == SessionState::Expired
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Running => "Running",
            SessionState::PromptingExpiry => "PromptingExpiry",
            SessionState::Expired => "Expired",
        };
        f.write_str(s)
    }
}

/// An observed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
}

pub trait Reducer {
    type State: LifecycleState;
    type Input;

    fn reduce(&self, current: Self::State, input: &Self::Input) -> Self::State;
}

/// Everything the election reducer looks at on one tick.
#[derive(Debug, Clone, Copy)]
pub struct ElectionSignals {
    pub now: DateTime<Utc>,
    pub start: Option<Deadline>,
    /// Whether the end-deadline countdown has elapsed.
    pub end_elapsed: bool,
    /// Flag owned by the election store.
    pub externally_active: bool,
}

impl ElectionSignals {
    pub fn new(
        now: DateTime<Utc>,
        start: Option<Deadline>,
        end: &CountdownSample,
        externally_active: bool,
    ) -> Self {
        Self {
            now,
            start,
            end_elapsed: end.elapsed,
            externally_active,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ElectionReducer;

impl Reducer for ElectionReducer {
    type State = ElectionState;
    type Input = ElectionSignals;

    fn reduce(&self, current: ElectionState, input: &ElectionSignals) -> ElectionState {
        // The store's flag may only hasten completion, never open an election.
        let target = if !input.externally_active || input.end_elapsed {
            ElectionState::Completed
        } else if input.start.map_or(true, |start| start.has_passed(input.now)) {
            ElectionState::Active
        } else {
            ElectionState::Upcoming
        };
        current.max(target)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionReducer {
    /// Lead time before the deadline at which the user is prompted.
    pub prompt_window_ms: i64,
}

impl SessionReducer {
    pub fn new(prompt_window_ms: i64) -> Self {
        Self { prompt_window_ms }
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Input = CountdownSample;

    fn reduce(&self, current: SessionState, sample: &CountdownSample) -> SessionState {
        let target = if sample.elapsed {
            SessionState::Expired
        } else if sample.remaining_ms <= self.prompt_window_ms {
            SessionState::PromptingExpiry
        } else {
            SessionState::Running
        };
        current.max(target)
    }
}

/// Owned current state of one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleCell<S> {
    state: S,
}

impl<S: LifecycleState> LifecycleCell<S> {
    pub fn new(initial: S) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> S {
        self.state
    }

    /// Check that `from -> to` does not move backward.
    pub fn check(from: S, to: S) -> Result<(), LifecycleError> {
        if to < from {
            return Err(LifecycleError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Apply a reducer result.
    ///
    /// Returns the transition on a change, `None` when the state is unchanged.
    /// A backward result is logged and ignored; the current state stays.
    pub fn apply(&mut self, next: S) -> Option<Transition<S>> {
        if let Err(err) = Self::check(self.state, next) {
            tracing::error!(%err, "rejected lifecycle transition");
            return None;
        }
        if next == self.state {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: next,
        };
        tracing::debug!(from = %transition.from, to = %transition.to, "lifecycle transition");
        self.state = next;
        Some(transition)
    }

    pub fn step<R>(&mut self, reducer: &R, input: &R::Input) -> Option<Transition<S>>
    where
        R: Reducer<State = S>,
    {
        self.apply(reducer.reduce(self.state, input))
    }
}
