//! Typed error hierarchy for the simulation engine.
//!
//! Three concerns, three types:
//! - `Cancelled` — the run that owns a suspension point is no longer current
//! - `StreamError` — genuine failures of the token-stream collaborator
//! - `RunError` — everything a single run can end with
//!
//! Cancellation is normal control flow (starting a new run or resetting
//! always cancels the previous run), so it is a distinct type rather than a
//! `StreamError` variant: the orchestrator swallows one and surfaces the
//! other.

use thiserror::Error;

/// The run owning the current suspension point has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled")]
pub struct Cancelled;

/// Failures of the external token-stream collaborator.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The backend refused the request (quota exhaustion, auth, bad prompt).
    #[error("generation request rejected: {0}")]
    Rejected(String),

    /// Transport-level failure while opening or reading the stream.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The stream produced a payload that could not be decoded.
    #[error("malformed stream payload: {0}")]
    Malformed(String),
}

/// Terminal outcome of a single simulation run, other than success.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("token stream failed: {0}")]
    Stream(#[from] StreamError),
}

impl RunError {
    /// True for the silent, expected outcome; false for surfaced failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RunError::Cancelled(_))
    }
}

/// Errors from the simulator's public control surface.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("prompt can only be edited while idle or finished")]
    PromptLocked,
}
