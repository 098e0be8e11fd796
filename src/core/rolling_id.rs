//! Monotone id generator that wraps from maximum to minimum atomically.

use std::sync::atomic::{AtomicI64, Ordering};

/// Produces a monotone sequence of `i64`s, wrapping from `i64::MAX` back to
/// `i64::MIN` instead of overflowing. Used to name pools and the worker
/// threads inside them for observability (`core::pool`).
#[derive(Debug, Default)]
pub struct RollingId {
    current: AtomicI64,
}

impl RollingId {
    /// Create a generator starting at `i64::MIN`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicI64::new(i64::MIN),
        }
    }

    /// Return the next id. Wraps atomically: a caller observing `i64::MAX`
    /// never sees it twice within the same wrap cycle, and the following
    /// call sees `i64::MIN`.
    pub fn next(&self) -> i64 {
        loop {
            let current = self.current.load(Ordering::Relaxed);
            let wrapped = current == i64::MAX;
            let next = if wrapped { i64::MIN } else { current + 1 };
            if self
                .current
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return current;
            }
        }
    }
}
