//! Timeout controller: runs a body on a worker, returning early if it
//! overruns its deadline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use super::error::CoreError;
use super::pool::Pool;

/// Cooperative cancellation flag handed to a timed-out body. The body is
/// expected to poll this (directly, or via [`crate::api::check_shutdown`]
/// composed with it) and stop promptly once it reads `true`.
#[derive(Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a flag that is not yet set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the deadline has already passed.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Runs bodies against a wall-clock deadline on a shared cached pool.
pub struct TimeoutController {
    pool: Arc<Pool>,
}

impl TimeoutController {
    /// Build a controller backed by `pool` (typically a cached, unbounded
    /// pool — a timed-out body's thread is abandoned, not reclaimed, so an
    /// unbounded backing pool avoids starving unrelated callers).
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    /// Run `body` on a pooled thread, waiting up to `timeout`. `body`
    /// receives an [`InterruptFlag`] it should poll to cooperate with early
    /// cancellation.
    ///
    /// Returns `Ok(R)` if `body` finished in time. Returns
    /// `Err(CoreError::Timeout)` if the deadline passed first — the flag is
    /// set so the abandoned body can still notice and stop, but its thread
    /// is not forcibly killed and its result, if any, is discarded.
    pub fn run<R, F>(&self, timeout: Duration, body: F) -> Result<R, CoreError>
    where
        F: FnOnce(InterruptFlag) -> R + Send + 'static,
        R: Send + 'static,
    {
        let flag = InterruptFlag::new();
        let flag_for_body = flag.clone();
        let (tx, rx) = mpsc::channel();

        self.pool.execute(move || {
            let result = catch_unwind(AssertUnwindSafe(|| body(flag_for_body)));
            // Best-effort: the receiver may already have timed out and
            // dropped `rx`, in which case nobody is listening.
            let _ = tx.send(result);
        })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => Err(CoreError::ThreadFramework(
                panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "timed body panicked".to_string()),
            )),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                flag.set();
                Err(CoreError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CoreError::ThreadFramework(
                "timed body's worker vanished without a result".to_string(),
            )),
        }
    }
}
