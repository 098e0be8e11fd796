//! External call-site surface: the functions a caller actually reaches for.
//!
//! Every function here is a thin wrapper over the process-wide
//! [`crate::core::machine::global`] singleton. Call [`crate::util::telemetry::init_tracing`]
//! once at process start if you want this crate's logs without installing
//! your own subscriber.

use std::sync::Arc;
use std::time::Duration;

use crate::core::error::CoreError;
use crate::core::machine::global;
use crate::core::pool::TaskHandle;
use crate::core::registry::InstanceHandle;
use crate::core::timeout::InterruptFlag;

/// Run `body` at most once for a given `(instance, call_site)` pair. Returns
/// whether it ran this call.
///
/// `call_site` should be a stable identifier for the call site itself (not
/// the instance) — e.g. a hash of the method's fully-qualified name, fixed
/// across invocations so repeated calls on the same instance collide.
pub fn run_once(instance: &InstanceHandle, call_site: u64, body: impl FnOnce()) -> bool {
    global().run_once().execute_and_catalog(instance, call_site, body)
}

/// Bind `(instance, call_site)` to a timer firing `callback` after `delay`,
/// then every `period`. If already bound, runs `callback` inline instead;
/// see [`crate::core::timer::PeriodicTimerController::add`].
pub fn run_on_timer(
    instance: &InstanceHandle,
    call_site: u64,
    delay: Duration,
    period: Duration,
    callback: impl Fn() + Send + Sync + 'static,
) -> Result<bool, CoreError> {
    global().timers().add(instance, call_site, delay, period, callback)
}

/// Cancel a timer previously bound with [`run_on_timer`].
pub fn cancel_timer(instance: &InstanceHandle, call_site: u64) -> bool {
    global().timers().cancel(instance, &call_site)
}

/// Run `body` with a deadline. `body` receives an [`InterruptFlag`] it
/// should poll to notice an overrun and stop promptly; see
/// [`crate::core::timeout::TimeoutController::run`].
pub fn with_timeout<R, F>(timeout: Duration, body: F) -> Result<R, CoreError>
where
    F: FnOnce(InterruptFlag) -> R + Send + 'static,
    R: Send + 'static,
{
    global().with_timeout(timeout, body)
}

/// Dispatch `job`. `poolable` selects where it runs: `false` sends it to the
/// framework's eagerly-created cached pool; `true` resolves (lazily
/// creating if necessary) the named pool `pool_name` identifies. If
/// `groupable` is true and the calling thread is inside an open thread group
/// ([`begin_thread_group`]), the returned handle is also recorded against it
/// — a task can be poolable without being groupable, and vice versa.
pub fn thread_runnable(
    poolable: bool,
    pool_name: &str,
    groupable: bool,
    job: impl FnOnce() + Send + 'static,
) -> Result<Arc<TaskHandle>, CoreError> {
    global().execute_in_thread(poolable, pool_name, groupable, job)
}

/// Open a new thread group on the calling thread. Tasks dispatched via
/// [`thread_runnable`] until the matching [`end_thread_group`] are tracked
/// together. Groups nest LIFO on a per-calling-thread stack; no id is handed
/// back since a caller only ever closes its own, currently innermost group.
pub fn begin_thread_group() {
    global().group_latch().create_thread_group();
}

/// Close the calling thread's current group and block until every task
/// tracked against it has finished, each waited on with its own `timeout`.
/// Returns the number of tasks that completed within their budget.
///
/// # Errors
///
/// Returns [`CoreError::IllegalState`] if the calling thread has no open
/// group, or [`CoreError::Timeout`] as soon as any single tracked task
/// outruns `timeout`.
pub fn end_thread_group(timeout: Duration) -> Result<usize, CoreError> {
    global().group_latch().wait_for_threads_to_finish(timeout)
}

/// `Ok(())` if the framework has not begun shutting down,
/// `Err(CoreError::Shutdown)` otherwise. Long-running [`thread_runnable`]
/// bodies should poll this between units of work.
pub fn check_shutdown() -> Result<(), CoreError> {
    global().shutdown_flag().check()
}

/// Begin process-wide cooperative shutdown, waiting up to `wait` (divided
/// across the framework's pools) for already-queued work to drain. See
/// [`crate::core::machine::ThreadMachine::shutdown`].
pub fn shutdown(wait: Duration) {
    global().shutdown(wait);
}
