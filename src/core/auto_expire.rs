//! Auto-expiring collection: a [`TtlCollection`] that sweeps itself on a
//! background timer instead of relying on callers to keep touching it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use super::error::CoreError;
use super::registry::InstanceHandle;
use super::ttl::TtlCollection;
use super::timer::PeriodicTimerController;

const SWEEP_ATTR: u64 = 0;

/// A [`TtlCollection`] that registers itself with a [`PeriodicTimerController`]
/// on construction, so expired entries (and their expiration hook, if any)
/// are reaped on `sweep_interval` even if nothing ever reads the collection
/// again.
///
/// Must be held behind the `Arc` [`Self::new`] returns: the background sweep
/// holds only a [`Weak`] reference and stops once the last strong reference
/// is dropped.
pub struct AutoExpiringCollection<T> {
    inner: TtlCollection<T>,
}

impl<T> AutoExpiringCollection<T>
where
    T: Send + Sync + 'static,
{
    /// Build a collection with entries expiring after `ttl`, swept at least
    /// every `sweep_interval`.
    pub fn new(
        ttl: Duration,
        sweep_interval: Duration,
        timers: &PeriodicTimerController<u64>,
    ) -> Result<Arc<Self>, CoreError> {
        Self::with_expiration_hook(ttl, sweep_interval, timers, |_| {})
    }

    /// Like [`Self::new`], also invoking `on_expiration` for every entry the
    /// background sweep reaps.
    pub fn with_expiration_hook(
        ttl: Duration,
        sweep_interval: Duration,
        timers: &PeriodicTimerController<u64>,
        on_expiration: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<Arc<Self>, CoreError> {
        if sweep_interval.is_zero() {
            return Err(CoreError::InvalidArgument(
                "sweep_interval must be greater than zero".into(),
            ));
        }
        let inner = TtlCollection::with_expiration_hook(ttl, on_expiration)?;
        let this = Arc::new(Self { inner });
        let instance: InstanceHandle = Arc::clone(&this);
        let weak_self: Weak<Self> = Arc::downgrade(&this);
        timers.add(&instance, SWEEP_ATTR, sweep_interval, sweep_interval, move || {
            if let Some(this) = weak_self.upgrade() {
                this.inner.drain_expired();
            }
        })?;
        Ok(this)
    }

    /// Insert a payload; see [`TtlCollection::add`].
    pub fn add(&self, payload: T) {
        self.inner.add(payload);
    }

    /// Number of live entries; see [`TtlCollection::len`].
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if empty; see [`TtlCollection::is_empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Live payloads in deadline order; see [`TtlCollection::iter_payloads`].
    pub fn iter_payloads(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.inner.iter_payloads()
    }
}
