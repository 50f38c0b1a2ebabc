//! Error taxonomy for the sync agent
//!
//! Every I/O-facing method converts failures into one of these variants at
//! its own boundary and logs them; nothing escapes to crash the background
//! loop.

use thiserror::Error;

/// Classified failures of the agent pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Expected pre-connection state (client not running, lockfile half
    /// written). Retried forever, never surfaced to the user.
    #[error("not yet available: {0}")]
    NotYetAvailable(&'static str),

    /// File-lock contention, a dropped stream frame, a failed HTTP call.
    /// Logged; the operation is retried or the frame dropped, and the loop
    /// continues.
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// The refresh token was rejected. Credentials are cleared and the user
    /// must log in again.
    #[error("authentication expired")]
    AuthExpired,

    /// The payload cannot produce a record (local player missing). The
    /// single event is abandoned without retry; it will not recur.
    #[error("incomplete payload: {0}")]
    DataIncomplete(&'static str),

    /// Disallowed game mode. A first-class non-error outcome, reported as
    /// skipped rather than failed.
    #[error("excluded by policy: {0}")]
    PolicyExcluded(String),
}

impl SyncError {
    pub fn transient(err: impl std::fmt::Display) -> Self {
        SyncError::Transient(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transient(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
