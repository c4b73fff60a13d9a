//! Core error types for voteclock-core.
//!
//! One enum per area (lifecycle, configuration, store, auth), all folded
//! into [`CoreError`] for callers that don't care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::ElectionState;

/// Core error type for voteclock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Deadline, transition or tracking errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Election store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Auth service errors surfaced as-is
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by watchers, reducers and the components built on them.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The deadline could not be understood as a timestamp.
    #[error("Invalid deadline '{input}': {reason}")]
    InvalidDeadline { input: String, reason: String },

    /// A watcher was asked to tick with a zero interval.
    #[error("Tick interval must be greater than zero")]
    InvalidTick,

    /// A reducer produced a state behind the current one.
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// Election row carried an empty or malformed id.
    #[error("Invalid election id: '{0}'")]
    InvalidElectionId(String),

    #[error("Election '{0}' is not tracked")]
    ElectionNotTracked(String),

    /// A vote was attempted outside the election's open window.
    #[error("Voting for election '{id}' is closed (state: {state})")]
    VotingClosed { id: String, state: ElectionState },

    /// The sign-out collaborator failed while expiring a session.
    #[error("Sign-out failed: {0}")]
    SignOut(#[from] AuthError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Could not resolve configuration directory: {0}")]
    NoDataDir(String),
}

/// Errors from the election/candidate snapshot store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown election: {0}")]
    UnknownElection(String),
}

/// Errors reported by the external auth/session service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("sign-out rejected: {0}")]
    Rejected(String),

    #[error("auth service unavailable")]
    Unavailable,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
