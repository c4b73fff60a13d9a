//! Deadline watchers.
//!
//! A [`DeadlineWatcher`] is a pull-based sampler: each call to
//! [`DeadlineWatcher::sample`] reads the clock once and yields one
//! [`CountdownSample`]. It owns no thread or timer, so the owner decides the
//! cadence (the same contract as a timer engine that is ticked from outside).
//!
//! [`spawn_watch`] puts a watcher on a tokio interval and streams samples over
//! a channel. The returned [`WatchHandle`] is the only way to stop it, and
//! dropping the handle stops it too.
//!
//! Both forms emit the first sample immediately. After the deadline passes
//! they keep emitting elapsed samples on every tick until cancelled, so a
//! polling consumer always observes the final state.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::countdown::CountdownSample;
use crate::deadline::Deadline;
use crate::error::LifecycleError;

/// Buffered samples per spawned watcher before ticks start being dropped.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct DeadlineWatcher<C> {
    deadline: Deadline,
    tick: Duration,
    clock: C,
    /// Lowest remaining value emitted so far.
    floor_ms: Option<i64>,
    cancelled: bool,
}

impl<C: Clock> DeadlineWatcher<C> {
    pub fn new(deadline: Deadline, tick: Duration, clock: C) -> Result<Self, LifecycleError> {
        if tick.is_zero() {
            return Err(LifecycleError::InvalidTick);
        }
        Ok(Self {
            deadline,
            tick,
            clock,
            floor_ms: None,
            cancelled: false,
        })
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Read the clock and produce the next sample, or `None` once cancelled.
    ///
    /// Remaining time never increases between samples, even if the clock
    /// steps backwards.
    pub fn sample(&mut self) -> Option<CountdownSample> {
        if self.cancelled {
            return None;
        }
        let raw = self.deadline.remaining_ms(self.clock.now());
        let remaining = self.floor_ms.map_or(raw, |floor| raw.min(floor));
        self.floor_ms = Some(remaining);
        Some(CountdownSample::from_remaining_ms(remaining))
    }

    /// Stop producing samples. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            tracing::trace!(deadline = %self.deadline, "watcher cancelled");
        }
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<C: Clock> Iterator for DeadlineWatcher<C> {
    type Item = CountdownSample;

    fn next(&mut self) -> Option<Self::Item> {
        self.sample()
    }
}

/// Owner of a spawned watcher task.
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the timer. Idempotent; also runs on drop.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start ticking `deadline` on the current tokio runtime.
///
/// The task ends when the handle cancels it or the receiver is dropped.
///
/// # Errors
/// Returns [`LifecycleError::InvalidTick`] for a zero interval, before any
/// task is spawned.
pub fn spawn_watch<C>(
    deadline: Deadline,
    tick: Duration,
    clock: C,
) -> Result<(WatchHandle, mpsc::Receiver<CountdownSample>), LifecycleError>
where
    C: Clock + 'static,
{
    let mut watcher = DeadlineWatcher::new(deadline, tick, clock)?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(watcher.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(sample) = watcher.sample() else {
                break;
            };
            if tx.send(sample).await.is_err() {
                tracing::trace!(deadline = %watcher.deadline(), "watch receiver dropped");
                break;
            }
        }
    });

    Ok((WatchHandle { task }, rx))
}
