//! Run-once controller: at-most-one execution per (instance, call-site).

use std::hash::Hash;

use parking_lot::Mutex;

use super::registry::{InstanceHandle, InstanceRegistry};

/// Guarantees at-most-one execution of a body per `(instance, method_id)`
/// pair. `A` must be a stable identity for the call site — two invocations
/// of the same declaration on the same instance must compare equal.
pub struct RunOnceController<A> {
    registry: InstanceRegistry<A, ()>,
    // Coarse external lock: `check_and_add` is already atomic on its own,
    // but the controller's contract ("under a single lock over the
    // registry") is preserved explicitly so a future caller that needs to
    // compose multiple registry ops for one call doesn't silently lose
    // atomicity.
    lock: Mutex<()>,
}

impl<A> Default for RunOnceController<A>
where
    A: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> RunOnceController<A>
where
    A: Eq + Hash + Clone,
{
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: InstanceRegistry::new(),
            lock: Mutex::new(()),
        }
    }

    /// Run `body` iff this is the first call for `(instance, method_id)`.
    /// Returns whether `body` ran.
    pub fn execute_and_catalog(
        &self,
        instance: &InstanceHandle,
        method_id: A,
        body: impl FnOnce(),
    ) -> bool {
        let _guard = self.lock.lock();
        if self.registry.check_and_add(instance, method_id, ()) {
            drop(_guard);
            body();
            true
        } else {
            false
        }
    }

    /// Number of instances this controller is currently tracking; mostly
    /// useful in tests to assert collection behavior.
    pub fn tracked_instance_count(&self) -> usize {
        self.registry.instance_count()
    }
}
