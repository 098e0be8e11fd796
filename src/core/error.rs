//! Error taxonomy for the dispatch and lifecycle subsystem.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the task dispatch and lifecycle subsystem.
///
/// `Shutdown` is deliberately its own variant rather than a payload of
/// `ThreadFramework`: the group latch (`core::group`) needs to tell shutdown
/// apart from an ordinary task failure so it can re-raise it as-is instead
/// of wrapping it.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A null/empty/range precondition was violated at a boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An operation was attempted in a state that forbids it (e.g.
    /// submission after shutdown, `reset` while not shut down).
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// A deadline was exceeded.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// A failure surfaced out of a thread-managed task; the original cause
    /// is preserved as formatted text since the cause may have crossed a
    /// thread boundary as a panic payload.
    #[error("thread framework error: {0}")]
    ThreadFramework(String),
    /// Raised by the cooperative shutdown check once the machine has begun
    /// shutting down.
    #[error("shutdown in progress")]
    Shutdown,
}

impl CoreError {
    /// True if this is the distinguished shutdown variant.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Application-facing result using `anyhow` for higher-level contexts that
/// don't need to match on a specific `CoreError` variant.
pub type AppResult<T> = Result<T, anyhow::Error>;
