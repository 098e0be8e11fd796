//! Cooperative shutdown signal shared across a [`crate::core::machine::ThreadMachine`]
//! and the tasks it dispatches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::CoreError;

/// A cloneable, process-wide shutdown flag. Long-running task bodies are
/// expected to call [`Self::check`] between units of work and return
/// promptly once it errors, rather than being forcibly killed.
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Create a flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Only [`crate::core::machine::ThreadMachine::reset`]
    /// clears it again, and only after the machine has actually shut down.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag. Called only by [`crate::core::machine::ThreadMachine::reset`],
    /// which gates this on the flag already being set.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// True if [`Self::trigger`] has been called and [`Self::reset`] hasn't
    /// cleared it since.
    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Ok(())` if still running, `Err(CoreError::Shutdown)` otherwise. The
    /// `CoreError::Shutdown` variant is distinguished precisely so callers
    /// (e.g. [`crate::core::group::GroupLatch`] propagating a task's
    /// failure) can recognize and re-raise it unchanged instead of wrapping
    /// it as an ordinary task failure.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.is_shutdown() {
            Err(CoreError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Panic with the distinguished [`CoreError::Shutdown`] payload if the
    /// flag is set. A task body that wants a failure caused by shutdown to
    /// be re-raised unchanged by [`crate::core::group::GroupLatch::wait_for_threads_to_finish`]
    /// (rather than reported as an ordinary panic) should call this at its
    /// checkpoints instead of [`Self::check`].
    pub fn panic_if_shutdown(&self) {
        if self.is_shutdown() {
            std::panic::panic_any(CoreError::Shutdown);
        }
    }
}
