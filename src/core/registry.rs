//! Instance-attribute registry: a weak-keyed two-level map.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// An opaque handle to an external instance. Registries store only a
/// [`Weak`] reference derived from this handle, so holding one in the
/// registry never keeps the target alive; once every strong `InstanceHandle`
/// is dropped, the registry's entry for it is reclaimed on the next
/// operation.
pub type InstanceHandle = Arc<dyn Any + Send + Sync>;

fn identity(instance: &InstanceHandle) -> usize {
    Arc::as_ptr(instance).cast::<()>() as usize
}

/// Mapping `InstanceHandle -> AttributeKey -> V`, keyed weakly on the
/// instance. `V` is the value type a particular controller needs to stash
/// per (instance, attribute): `()` for [`RunOnceController`](super::run_once::RunOnceController),
/// a timer binding for [`PeriodicTimerController`](super::timer::PeriodicTimerController).
pub struct InstanceRegistry<A, V> {
    inner: Mutex<HashMap<usize, (Weak<dyn Any + Send + Sync>, HashMap<A, V>)>>,
}

impl<A, V> Default for InstanceRegistry<A, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<A, V> InstanceRegistry<A, V>
where
    A: Eq + Hash + Clone,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `(instance, attr)` has a stored value.
    pub fn contains(&self, instance: &InstanceHandle, attr: &A) -> bool {
        let mut inner = self.inner.lock();
        Self::purge_dead(&mut inner);
        inner
            .get(&identity(instance))
            .is_some_and(|(_, attrs)| attrs.contains_key(attr))
    }

    /// Atomic test-and-set: inserts `value` under `(instance, attr)` iff
    /// absent, returning whether the insertion happened.
    pub fn check_and_add(&self, instance: &InstanceHandle, attr: A, value: V) -> bool {
        let mut inner = self.inner.lock();
        Self::purge_dead(&mut inner);
        let (_, attrs) = inner
            .entry(identity(instance))
            .or_insert_with(|| (Arc::downgrade(instance), HashMap::new()));
        if attrs.contains_key(&attr) {
            false
        } else {
            attrs.insert(attr, value);
            true
        }
    }

    /// Unconditional put, returning the previous value if any.
    pub fn add(&self, instance: &InstanceHandle, attr: A, value: V) -> Option<V> {
        let mut inner = self.inner.lock();
        Self::purge_dead(&mut inner);
        let (_, attrs) = inner
            .entry(identity(instance))
            .or_insert_with(|| (Arc::downgrade(instance), HashMap::new()));
        attrs.insert(attr, value)
    }

    /// Remove and return `(instance, attr)`'s value, if present.
    pub fn take(&self, instance: &InstanceHandle, attr: &A) -> Option<V> {
        let mut inner = self.inner.lock();
        Self::purge_dead(&mut inner);
        let key = identity(instance);
        let value = inner.get_mut(&key).and_then(|(_, attrs)| attrs.remove(attr));
        if let Some((_, attrs)) = inner.get(&key) {
            if attrs.is_empty() {
                inner.remove(&key);
            }
        }
        value
    }

    /// Number of live outer entries (distinct reachable instances tracked).
    pub fn instance_count(&self) -> usize {
        let mut inner = self.inner.lock();
        Self::purge_dead(&mut inner);
        inner.len()
    }

    fn purge_dead(inner: &mut HashMap<usize, (Weak<dyn Any + Send + Sync>, HashMap<A, V>)>) {
        inner.retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}
