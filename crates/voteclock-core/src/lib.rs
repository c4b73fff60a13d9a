//! # voteclock Core Library
//!
//! Deadline-driven lifecycle engine for a voting portal: countdowns, election
//! open/closed status and session expiry, all derived from one clock.
//!
//! ## Architecture
//!
//! - **Clock**: real, manual, or tokio-driven time source
//! - **Countdown**: signed remaining time to `"{d}d {h}h {m}m {s}s"` / `"Ended"`
//! - **Watcher**: per-deadline sampler, pulled by its owner or ticked by tokio
//! - **Lifecycle**: pure forward-only reducers plus edge-triggered state cells
//! - **Session**: prompt / extend / auto-expire guard around a renewable deadline
//! - **Election**: Upcoming -> Active -> Completed tracking for a fetched list
//!
//! ## Key Components
//!
//! - [`DeadlineWatcher`]: Sampler behind every countdown
//! - [`SessionGuard`]: Session expiry state machine
//! - [`ElectionStatusTracker`]: Election status for a collection
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod config;
pub mod countdown;
pub mod deadline;
pub mod election;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod session;
pub mod store;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::Config;
pub use countdown::{Breakdown, CountdownSample, ENDED_LABEL};
pub use deadline::Deadline;
pub use election::{Election, ElectionStatus, ElectionStatusTracker};
pub use error::{AuthError, ConfigError, CoreError, LifecycleError, StoreError};
pub use events::Event;
pub use lifecycle::{ElectionState, LifecycleCell, Reducer, SessionState, Transition};
pub use session::{SessionConfig, SessionGuard, SessionGuardHandle};
pub use store::{AuthService, Candidate, ElectionRecord, ElectionStore, JsonSnapshotStore, Position};
pub use watcher::{spawn_watch, DeadlineWatcher, WatchHandle};
