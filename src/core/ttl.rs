//! Time-to-live collection backing per-instance registries.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::CoreError;

struct Entry<T> {
    payload: T,
    deadline: Instant,
}

/// A container whose elements expire a fixed duration after insertion.
///
/// Because every entry shares the same TTL and the clock is monotonic,
/// insertion order *is* deadline order — expired entries always sit at the
/// front. Every public operation except [`clear`](Self::clear) sweeps
/// expired entries (in deadline order) before doing its own work, invoking
/// the expiration hook supplied at construction for each one.
pub struct TtlCollection<T> {
    ttl: Duration,
    entries: Mutex<VecDeque<Entry<T>>>,
    on_expiration: Box<dyn Fn(&T) + Send + Sync>,
}

impl<T> TtlCollection<T> {
    /// Create a collection with no expiration side effect.
    pub fn new(ttl: Duration) -> Result<Self, CoreError> {
        Self::with_expiration_hook(ttl, |_| {})
    }

    /// Create a collection that invokes `on_expiration` for every entry it
    /// sweeps away.
    pub fn with_expiration_hook(
        ttl: Duration,
        on_expiration: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<Self, CoreError> {
        if ttl.is_zero() {
            return Err(CoreError::InvalidArgument(
                "ttl must be greater than zero".into(),
            ));
        }
        Ok(Self {
            ttl,
            entries: Mutex::new(VecDeque::new()),
            on_expiration: Box::new(on_expiration),
        })
    }

    /// Insert a payload; its deadline is `now + ttl`.
    pub fn add(&self, payload: T) {
        self.drain_expired();
        let mut entries = self.entries.lock();
        entries.push_back(Entry {
            payload,
            deadline: Instant::now() + self.ttl,
        });
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        self.drain_expired();
        self.entries.lock().len()
    }

    /// True if no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, live or expired, without invoking the expiration
    /// hook. The one operation exempt from sweeping.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Live payloads in deadline order (oldest first).
    pub fn iter_payloads(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.drain_expired();
        self.entries.lock().iter().map(|e| e.payload.clone()).collect()
    }

    /// Remove entries that match `payload`, returning how many were removed.
    /// Equality is the payload's, not the wrapper's.
    pub fn remove(&self, payload: &T) -> usize
    where
        T: PartialEq,
    {
        self.drain_expired();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| &e.payload != payload);
        before - entries.len()
    }

    /// True if any live entry equals `payload`.
    pub fn contains(&self, payload: &T) -> bool
    where
        T: PartialEq,
    {
        self.drain_expired();
        self.entries.lock().iter().any(|e| &e.payload == payload)
    }

    /// Sweep and discard every entry whose deadline has passed, invoking the
    /// expiration hook for each. Public so `core::auto_expire` can trigger a
    /// sweep without needing to read the collection.
    pub fn drain_expired(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut entries = self.entries.lock();
            while matches!(entries.front(), Some(e) if e.deadline <= now) {
                if let Some(e) = entries.pop_front() {
                    expired.push(e.payload);
                }
            }
        }
        let count = expired.len();
        for payload in &expired {
            (self.on_expiration)(payload);
        }
        count
    }
}
