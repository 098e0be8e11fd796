//! Thread-group latch: tracks the tasks spawned while a caller context is
//! "inside" a named group, so it can later wait for all of them together.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::error::CoreError;
use super::pool::{TaskFailure, TaskHandle};
use super::rolling_id::RollingId;

/// Identifies one open thread group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(i64);

thread_local! {
    // LIFO stack of groups the *calling* thread is currently inside. Nested
    // `begin_thread_group` calls on the same caller context push; `end`
    // pops. Each OS thread (and therefore each caller context, since groups
    // are opened and closed on the same thread) gets its own stack.
    static GROUP_STACK: RefCell<Vec<GroupId>> = const { RefCell::new(Vec::new()) };
}

/// Tracks task handles per open group, scoped to the calling thread's
/// current group (if any).
#[derive(Default)]
pub struct GroupLatch {
    groups: Mutex<HashMap<GroupId, Vec<Arc<TaskHandle>>>>,
    id_gen: RollingId,
}

impl GroupLatch {
    /// Create a latch with no open groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new group and push it onto this thread's group stack. Tasks
    /// dispatched on this thread until the matching [`Self::end_thread_group`]
    /// are collected into it via [`Self::add_thread_to_group`].
    pub fn create_thread_group(&self) -> GroupId {
        let id = GroupId(self.id_gen.next());
        self.groups.lock().insert(id, Vec::new());
        GROUP_STACK.with(|stack| stack.borrow_mut().push(id));
        id
    }

    /// The group the calling thread is currently inside, if any (top of its
    /// stack).
    pub fn current_group(&self) -> Option<GroupId> {
        GROUP_STACK.with(|stack| stack.borrow().last().copied())
    }

    /// Record `handle` against the calling thread's current group.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the calling thread has no open
    /// group. Callers that dispatch work outside a group (valid, untracked
    /// fire-and-forget) should check [`Self::current_group`] first rather
    /// than treat this as a hard failure.
    pub fn add_thread_to_group(&self, handle: Arc<TaskHandle>) -> Result<GroupId, CoreError> {
        let group = self
            .current_group()
            .ok_or_else(|| CoreError::IllegalState("no open thread group on this thread".into()))?;
        let mut groups = self.groups.lock();
        if let Some(handles) = groups.get_mut(&group) {
            handles.push(handle);
        }
        Ok(group)
    }

    /// Pop the calling thread's current group off its stack and block until
    /// every task recorded against it finishes, each waited on with its own
    /// `timeout`. Returns the number of tasks that completed within their
    /// wait. Raises [`CoreError::Timeout`] as soon as any single task
    /// exceeds `timeout`, leaving the remaining tasks unwaited (they keep
    /// running; their handles are simply dropped).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the calling thread has no open
    /// group, [`CoreError::Timeout`] if a tracked task outruns `timeout`,
    /// [`CoreError::Shutdown`] re-raised unchanged as soon as any tracked
    /// task's failure was caused by a shutdown signal, or
    /// [`CoreError::ThreadFramework`] collecting any ordinary panicking
    /// tasks' messages once all of them have been waited on within their
    /// budgets.
    pub fn wait_for_threads_to_finish(&self, timeout: Duration) -> Result<usize, CoreError> {
        let id = GROUP_STACK
            .with(|stack| stack.borrow_mut().pop())
            .ok_or_else(|| CoreError::IllegalState("no open thread group on this thread".into()))?;
        let handles = self.groups.lock().remove(&id).unwrap_or_default();

        let mut completed = 0;
        let mut failures = Vec::new();
        for handle in handles {
            match handle.wait_timeout(timeout) {
                Some(Ok(())) => completed += 1,
                Some(Err(TaskFailure::Shutdown)) => return Err(CoreError::Shutdown),
                Some(Err(TaskFailure::Panicked(message))) => {
                    completed += 1;
                    failures.push(message);
                }
                None => return Err(CoreError::Timeout(timeout)),
            }
        }
        if failures.is_empty() {
            Ok(completed)
        } else {
            Err(CoreError::ThreadFramework(failures.join("; ")))
        }
    }

    /// Pop the calling thread's current group off its stack and discard its
    /// bookkeeping without waiting on any of its tasks.
    pub fn end_thread_group(&self) -> Option<GroupId> {
        let id = GROUP_STACK.with(|stack| stack.borrow_mut().pop())?;
        self.groups.lock().remove(&id);
        Some(id)
    }

    /// Discard every group still open on the *calling thread's* stack,
    /// without waiting on any of their tasks. Scoped to the calling
    /// thread's own context: other threads' open groups are untouched.
    /// Returns the number of task handles that were released.
    pub fn release_all(&self) -> usize {
        let ids = GROUP_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
        let mut groups = self.groups.lock();
        ids.into_iter()
            .filter_map(|id| groups.remove(&id))
            .map(|handles| handles.len())
            .sum()
    }

    /// Drop every open group's bookkeeping, across every caller context.
    /// Used only on process-wide shutdown ([`super::machine::ThreadMachine::shutdown`]);
    /// does not touch any thread's local stack, so a thread still "inside" a
    /// group simply finds its group gone on the next lookup.
    pub fn release_all_groups_globally(&self) {
        self.groups.lock().clear();
    }

    /// Number of currently open groups.
    pub fn number_of_thread_groups(&self) -> usize {
        self.groups.lock().len()
    }

    /// Number of tasks recorded against `group`, or 0 if it doesn't exist.
    pub fn number_of_threads(&self, group: GroupId) -> usize {
        self.groups
            .lock()
            .get(&group)
            .map_or(0, std::vec::Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pool::{Pool, PoolConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn group_wait_blocks_until_all_tracked_tasks_finish() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("grouptest", PoolConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));

        let group = latch.create_thread_group();
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            let handle = pool
                .submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            latch.add_thread_to_group(handle).unwrap();
        }
        assert_eq!(latch.number_of_threads(group), 5);
        let completed = latch
            .wait_for_threads_to_finish(Duration::from_secs(5))
            .unwrap();
        assert_eq!(completed, 5);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(latch.number_of_thread_groups(), 0);
        assert_eq!(latch.current_group(), None);
    }

    #[test]
    fn ungrouped_dispatch_is_rejected() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("ungrouped", PoolConfig::default());
        let handle = pool.submit(|| {}).unwrap();
        let err = latch.add_thread_to_group(handle).unwrap_err();
        assert!(matches!(err, CoreError::IllegalState(_)));
    }

    #[test]
    fn nested_groups_use_a_lifo_stack() {
        let latch = GroupLatch::new();
        let outer = latch.create_thread_group();
        let inner = latch.create_thread_group();
        assert_eq!(latch.current_group(), Some(inner));
        latch.end_thread_group();
        assert_eq!(latch.current_group(), Some(outer));
        latch.end_thread_group();
        assert_eq!(latch.current_group(), None);
    }

    #[test]
    fn wait_surfaces_panicking_task_messages() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("panicgroup", PoolConfig::default());
        latch.create_thread_group();
        let handle = pool.submit(|| panic!("kaboom")).unwrap();
        latch.add_thread_to_group(handle).unwrap();
        let err = latch
            .wait_for_threads_to_finish(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, CoreError::ThreadFramework(_)));
    }

    #[test]
    fn wait_re_raises_a_shutdown_signalling_task_unchanged() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("shutdowngroup", PoolConfig::default());
        latch.create_thread_group();
        let handle = pool
            .submit(|| std::panic::panic_any(CoreError::Shutdown))
            .unwrap();
        latch.add_thread_to_group(handle).unwrap();
        let err = latch
            .wait_for_threads_to_finish(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, CoreError::Shutdown));
    }

    #[test]
    fn wait_times_out_on_a_slow_task() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("slowgroup", PoolConfig::default());
        latch.create_thread_group();
        let handle = pool
            .submit(|| std::thread::sleep(Duration::from_millis(200)))
            .unwrap();
        latch.add_thread_to_group(handle).unwrap();
        let err = latch
            .wait_for_threads_to_finish(Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout(_)));
    }

    #[test]
    fn per_context_release_all_only_drops_the_calling_threads_group() {
        let latch = GroupLatch::new();
        let pool = Pool::bounded("releasetest", PoolConfig::default());
        let group = latch.create_thread_group();
        let handle = pool.submit(|| {}).unwrap();
        latch.add_thread_to_group(handle).unwrap();
        assert_eq!(latch.release_all(), 1);
        assert_eq!(latch.number_of_threads(group), 0);
        assert_eq!(latch.current_group(), None);
    }
}
