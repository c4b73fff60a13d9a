//! Session expiry guard.
//!
//! ## State Transitions
//!
//! ```text
//! Running -> PromptingExpiry -> Expired
//!    ^             |
//!    +-- extend() -+
//! ```
//!
//! `extend()` does not move the lifecycle backward: it throws the old
//! deadline, watcher and state away and installs fresh ones. The old watcher
//! is cancelled before the new one exists, so a stale deadline can never
//! expire a renewed session.
//!
//! [`SessionGuard`] is ticked by its owner. [`SessionGuardHandle`] runs one
//! on a tokio interval, with the guard behind a mutex so the deadline and its
//! watcher are always swapped together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::countdown::CountdownSample;
use crate::deadline::Deadline;
use crate::error::LifecycleError;
use crate::events::Event;
use crate::lifecycle::{LifecycleCell, LifecycleState, SessionReducer, SessionState};
use crate::store::AuthService;
use crate::watcher::DeadlineWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Budget granted at login and on every extension.
    pub duration: Duration,
    /// How long before the deadline the user is prompted.
    pub prompt_window: Duration,
    pub tick: Duration,
}

impl SessionConfig {
    pub fn new(duration: Duration, prompt_window: Duration) -> Self {
        Self {
            duration,
            prompt_window,
            tick: Duration::from_secs(1),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    fn validate(&self) -> Result<(), LifecycleError> {
        if self.tick.is_zero() {
            return Err(LifecycleError::InvalidTick);
        }
        if self.duration.is_zero() || self.prompt_window >= self.duration {
            return Err(LifecycleError::InvalidDeadline {
                input: format!("{:?} with {:?} prompt window", self.duration, self.prompt_window),
                reason: "session must be longer than its prompt window".into(),
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60), Duration::from_secs(30))
    }
}

/// Per-login expiry guard. `Expired` is final; a new login needs a new guard.
#[derive(Debug)]
pub struct SessionGuard<C, A> {
    clock: C,
    auth: A,
    config: SessionConfig,
    reducer: SessionReducer,
    deadline: Deadline,
    cell: LifecycleCell<SessionState>,
    watcher: Option<DeadlineWatcher<C>>,
    /// Bumped every time a watcher is installed.
    generation: u64,
    last: Option<CountdownSample>,
    signed_out: bool,
}

impl<C: Clock + Clone, A: AuthService> SessionGuard<C, A> {
    /// Start guarding a fresh session: deadline `now + duration`, `Running`.
    pub fn start(clock: C, config: SessionConfig, auth: A) -> Result<Self, LifecycleError> {
        config.validate()?;
        let prompt_window_ms = i64::try_from(config.prompt_window.as_millis()).unwrap_or(i64::MAX);
        let (deadline, watcher) = Self::subscribe(&clock, &config)?;
        tracing::info!(%deadline, "session started");
        let mut guard = Self {
            clock,
            auth,
            config,
            reducer: SessionReducer::new(prompt_window_ms),
            deadline,
            cell: LifecycleCell::new(SessionState::Running),
            watcher: None,
            generation: 0,
            last: None,
            signed_out: false,
        };
        guard.install(watcher);
        Ok(guard)
    }

    pub fn state(&self) -> SessionState {
        self.cell.state()
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Most recent countdown sample.
    pub fn last_sample(&self) -> Option<&CountdownSample> {
        self.last.as_ref()
    }

    pub fn watcher_generation(&self) -> u64 {
        self.generation
    }

    /// 0 or 1.
    pub fn active_watchers(&self) -> usize {
        usize::from(self.watcher.is_some())
    }

    pub fn started_event(&self) -> Event {
        Event::SessionStarted {
            deadline: self.deadline.instant(),
            at: self.clock.now(),
        }
    }

    /// Sample, reduce, and fire the effect of any transition observed.
    ///
    /// # Errors
    /// Only when reaching `Expired` and the sign-out call fails.
    pub fn tick(&mut self) -> Result<Option<Event>, LifecycleError> {
        let Some(sample) = self.watcher.as_mut().and_then(|w| w.sample()) else {
            return Ok(None);
        };
        let transition = self.cell.step(&self.reducer, &sample);
        let remaining_ms = sample.remaining_ms;
        self.last = Some(sample);

        match transition.map(|t| t.to) {
            Some(SessionState::PromptingExpiry) => {
                tracing::info!(remaining_ms, "session entering prompt window");
                Ok(Some(Event::SessionPrompted {
                    remaining_ms,
                    at: self.clock.now(),
                }))
            }
            Some(SessionState::Expired) => self.expire(),
            _ => Ok(None),
        }
    }

    /// Renew the session for another full `duration`.
    ///
    /// No-op once expired; the caller has to authenticate again.
    pub fn extend(&mut self) -> Result<Option<Event>, LifecycleError> {
        let from = self.cell.state();
        if from.is_terminal() {
            tracing::debug!("extend ignored on expired session");
            return Ok(None);
        }
        let (deadline, watcher) = Self::subscribe(&self.clock, &self.config)?;
        if let Some(mut stale) = self.watcher.take() {
            stale.cancel();
        }
        self.deadline = deadline;
        self.cell = LifecycleCell::new(SessionState::Running);
        self.install(watcher);
        tracing::info!(%deadline, %from, generation = self.generation, "session extended");
        Ok(Some(Event::SessionExtended {
            from,
            deadline: deadline.instant(),
            at: self.clock.now(),
        }))
    }

    /// End the session: sign out once, stop the watcher.
    ///
    /// Reached from `tick` when the deadline passes, and directly by an
    /// explicit logout. Later calls do nothing.
    pub fn expire(&mut self) -> Result<Option<Event>, LifecycleError> {
        if self.signed_out {
            return Ok(None);
        }
        self.signed_out = true;
        self.cell.apply(SessionState::Expired);
        let result = self.auth.sign_out();
        if let Some(mut watcher) = self.watcher.take() {
            watcher.cancel();
        }
        let at = self.clock.now();
        match result {
            Ok(()) => {
                tracing::info!("session expired, signed out");
                Ok(Some(Event::SessionExpired {
                    signed_out: true,
                    at,
                }))
            }
            Err(err) => {
                tracing::error!(%err, "session expired but sign-out failed");
                Err(err.into())
            }
        }
    }

    fn subscribe(
        clock: &C,
        config: &SessionConfig,
    ) -> Result<(Deadline, DeadlineWatcher<C>), LifecycleError> {
        let budget = chrono::Duration::from_std(config.duration).map_err(|err| {
            LifecycleError::InvalidDeadline {
                input: format!("{:?}", config.duration),
                reason: err.to_string(),
            }
        })?;
        let deadline = Deadline::after(clock.now(), budget)?;
        let watcher = DeadlineWatcher::new(deadline, config.tick, clock.clone())?;
        Ok((deadline, watcher))
    }

    fn install(&mut self, mut watcher: DeadlineWatcher<C>) {
        self.last = watcher.sample();
        self.watcher = Some(watcher);
        self.generation += 1;
    }
}

/// A [`SessionGuard`] ticking on the tokio runtime.
///
/// Events (including expiry) arrive on the receiver returned by
/// [`SessionGuardHandle::spawn`]. The ticking task ends after expiry or when
/// the handle is dropped.
#[derive(Debug)]
pub struct SessionGuardHandle<C, A> {
    guard: Arc<Mutex<SessionGuard<C, A>>>,
    task: JoinHandle<()>,
}

impl<C, A> SessionGuardHandle<C, A>
where
    C: Clock + Clone + 'static,
    A: AuthService + 'static,
{
    pub fn spawn(guard: SessionGuard<C, A>) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let tick = guard.config.tick;
        let guard = Arc::new(Mutex::new(guard));
        let (tx, rx) = mpsc::unbounded_channel();

        let shared = Arc::clone(&guard);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let (outcome, at, finished) = {
                    let mut guard = lock(&shared);
                    let outcome = guard.tick();
                    (outcome, guard.clock.now(), guard.state().is_terminal())
                };
                let event = match outcome {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::error!(%err, "session guard tick failed");
                        Some(Event::SessionExpired {
                            signed_out: false,
                            at,
                        })
                    }
                };
                if let Some(event) = event {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                if finished {
                    break;
                }
            }
        });

        (Self { guard, task }, rx)
    }

    pub fn extend(&self) -> Result<Option<Event>, LifecycleError> {
        lock(&self.guard).extend()
    }

    /// Explicit logout.
    pub fn expire(&self) -> Result<Option<Event>, LifecycleError> {
        lock(&self.guard).expire()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.guard).state()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        lock(&self.guard).deadline().instant()
    }

    pub fn watcher_generation(&self) -> u64 {
        lock(&self.guard).watcher_generation()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<C, A> Drop for SessionGuardHandle<C, A> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock<C, A>(guard: &Mutex<SessionGuard<C, A>>) -> MutexGuard<'_, SessionGuard<C, A>> {
    // A panic mid-tick leaves the guard in its last consistent state.
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}
