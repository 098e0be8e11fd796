//! Central dispatcher: the process-wide entry point tying the pool map,
//! listeners, the group latch, and cooperative shutdown together.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::builders::PoolBuilder;
use crate::config::FrameworkConfig;

use super::error::CoreError;
use super::group::GroupLatch;
use super::listener::{DecoratingListener, ThreadEventListener};
use super::pool::{Pool, TaskHandle};
use super::run_once::RunOnceController;
use super::shutdown::ShutdownFlag;
use super::timeout::{InterruptFlag, TimeoutController};
use super::timer::PeriodicTimerController;

/// Key the eagerly-created cached unbounded pool is registered under in the
/// pool map — a sentinel every other pool name is guaranteed not to collide
/// with in practice, and reserved regardless.
pub const CACHED_POOL_NAME: &str = "cached";

/// The framework's single process-wide dispatcher. Access it through
/// [`global`]; construct your own only in tests that need isolation from
/// the process singleton.
pub struct ThreadMachine {
    pools: Mutex<HashMap<String, Arc<Pool>>>,
    config: FrameworkConfig,
    listeners: Arc<DecoratingListener>,
    shutdown: ShutdownFlag,
    group_latch: GroupLatch,
    run_once: RunOnceController<u64>,
    timers: PeriodicTimerController<u64>,
    timeouts: RwLock<TimeoutController>,
}

impl Default for ThreadMachine {
    fn default() -> Self {
        Self::new(FrameworkConfig::default())
    }
}

impl ThreadMachine {
    /// Build a machine from `config`, eagerly creating its cached pool. Not
    /// the process singleton — use [`global`] for that.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`FrameworkConfig::validate`] — callers
    /// loading a config from outside the process (e.g.
    /// [`FrameworkConfig::from_json_str`], which already validates) should
    /// check it themselves rather than rely on this as normal control flow.
    #[must_use]
    pub fn new(config: FrameworkConfig) -> Self {
        config
            .validate()
            .unwrap_or_else(|e| panic!("invalid framework config: {e}"));
        let cached_pool = Arc::new(Self::build_cached_pool(&config));
        let mut pools = HashMap::new();
        pools.insert(CACHED_POOL_NAME.to_string(), Arc::clone(&cached_pool));
        Self {
            timeouts: RwLock::new(TimeoutController::new(cached_pool)),
            pools: Mutex::new(pools),
            config,
            listeners: Arc::new(DecoratingListener::new()),
            shutdown: ShutdownFlag::new(),
            group_latch: GroupLatch::new(),
            run_once: RunOnceController::new(),
            timers: PeriodicTimerController::new(),
        }
    }

    fn build_cached_pool(config: &FrameworkConfig) -> Pool {
        PoolBuilder::new(CACHED_POOL_NAME)
            .with_profile(config.cached.clone())
            .build_cached()
            .expect("config was already validated in ThreadMachine::new/reset")
    }

    /// Resolve the pool registered under `name`, creating it from the
    /// configured default profile under the pool-map lock if it doesn't
    /// exist yet (checked again after acquiring the lock, so concurrent
    /// first lookups for the same name don't race each other into building
    /// two pools).
    fn get_or_create_pool(&self, name: &str) -> Arc<Pool> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(name) {
            return Arc::clone(pool);
        }
        let pool = Arc::new(
            PoolBuilder::new(name)
                .with_profile(self.config.default_pool.clone())
                .build_bounded()
                .expect("config was already validated in ThreadMachine::new/reset"),
        );
        pools.insert(name.to_string(), Arc::clone(&pool));
        pool
    }

    /// Register a listener invoked around every task dispatched through
    /// [`Self::execute_in_thread`].
    pub fn register_listener(&self, listener: Box<dyn ThreadEventListener>) {
        self.listeners.register(listener);
    }

    /// Run-once controller shared across the whole process.
    pub fn run_once(&self) -> &RunOnceController<u64> {
        &self.run_once
    }

    /// Periodic-timer controller shared across the whole process.
    pub fn timers(&self) -> &PeriodicTimerController<u64> {
        &self.timers
    }

    /// Thread-group latch shared across the whole process.
    pub fn group_latch(&self) -> &GroupLatch {
        &self.group_latch
    }

    /// The cooperative shutdown flag every dispatched task should poll.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Dispatch `job`, wrapped so registered listeners observe it and the
    /// group latch records it when asked to.
    ///
    /// `poolable` selects where the task runs: `false` sends it to the
    /// eagerly-created cached pool (the same one backing
    /// [`Self::with_timeout`]); `true` resolves (lazily creating if
    /// necessary) the named pool `pool_name` identifies. `groupable` decides
    /// whether the resulting handle is also recorded against the calling
    /// thread's current group, if it has one open — a task can be poolable
    /// without being groupable, and vice versa.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the machine has begun shutting
    /// down, or whatever [`Pool::submit`] returns if the resolved pool's
    /// queue has been disconnected.
    pub fn execute_in_thread(
        &self,
        poolable: bool,
        pool_name: &str,
        groupable: bool,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<Arc<TaskHandle>, CoreError> {
        self.shutdown.check()?;
        let pool = if poolable {
            self.get_or_create_pool(pool_name)
        } else {
            self.get_or_create_pool(CACHED_POOL_NAME)
        };
        let listeners = Arc::clone(&self.listeners);
        let wrapped = move || {
            let thread_name = thread::current().name().unwrap_or("unnamed").to_string();
            if !listeners.before_execution(&thread_name) {
                return;
            }
            match catch_unwind(AssertUnwindSafe(job)) {
                Ok(()) => listeners.after_execution(&thread_name),
                Err(panic) => {
                    // A shutdown-signalling panic bypasses listener rewriting
                    // entirely: re-raise it with its typed payload intact so
                    // the pool's own catch_unwind can classify it as
                    // `TaskFailure::Shutdown` rather than an ordinary panic.
                    if panic
                        .downcast_ref::<CoreError>()
                        .is_some_and(CoreError::is_shutdown)
                    {
                        std::panic::resume_unwind(panic);
                    }
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "task panicked".to_string());
                    // A non-null verdict surfaces to the pool's default
                    // failure pathway: re-raise so the outer pool-level
                    // catch_unwind records this task's handle as failed.
                    if let Some(surfaced) = listeners.on_exception(&thread_name, &message) {
                        std::panic::resume_unwind(Box::new(surfaced));
                    }
                }
            }
        };
        let handle = pool.submit(wrapped)?;
        // Ungrouped dispatch is valid and simply isn't tracked for a joint
        // wait; only record it when the caller asked to and has a group open.
        if groupable && self.group_latch.current_group().is_some() {
            let _ = self.group_latch.add_thread_to_group(Arc::clone(&handle));
        }
        Ok(handle)
    }

    /// Run `body` against `timeout` on the cached pool; see
    /// [`TimeoutController::run`].
    pub fn with_timeout<R, F>(&self, timeout: Duration, body: F) -> Result<R, CoreError>
    where
        F: FnOnce(InterruptFlag) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.shutdown.check()?;
        self.timeouts.read().run(timeout, body)
    }

    /// Begin a cooperative shutdown. Idempotent: returns immediately if
    /// already shut down. Stops every pool in the pool map from accepting
    /// new work, divides `wait` evenly across them, and awaits each pool's
    /// drain up to its share of the budget (best-effort; a pool that doesn't
    /// drain in time is simply abandoned, not force-killed — Rust has no
    /// safe forced-thread-termination primitive). Finally releases every
    /// open thread group's bookkeeping across every caller context.
    pub fn shutdown(&self, wait: Duration) {
        if self.shutdown.is_shutdown() {
            return;
        }
        info!("thread machine shutting down");
        self.shutdown.trigger();
        let pools: Vec<Arc<Pool>> = self.pools.lock().values().cloned().collect();
        for pool in &pools {
            pool.shutdown();
        }

        let per_pool_budget = if pools.is_empty() {
            wait
        } else {
            wait / u32::try_from(pools.len()).unwrap_or(u32::MAX)
        };
        for pool in &pools {
            await_drain(pool, per_pool_budget);
        }

        self.group_latch.release_all_groups_globally();
    }

    /// Re-initialize the machine after a shutdown: clears the shutdown flag
    /// and replaces the pool map with a fresh eagerly-created cached pool,
    /// discarding every other pool the map had accumulated. Legal only once
    /// the machine has actually shut down.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the machine has not shut down.
    pub fn reset(&self) -> Result<(), CoreError> {
        if !self.shutdown.is_shutdown() {
            return Err(CoreError::IllegalState(
                "reset is only legal after the machine has shut down".into(),
            ));
        }
        let cached_pool = Arc::new(Self::build_cached_pool(&self.config));
        let mut pools = HashMap::new();
        pools.insert(CACHED_POOL_NAME.to_string(), Arc::clone(&cached_pool));
        *self.pools.lock() = pools;
        *self.timeouts.write() = TimeoutController::new(cached_pool);
        self.shutdown.reset();
        info!("thread machine reset after shutdown");
        Ok(())
    }
}

fn await_drain(pool: &Pool, budget: Duration) {
    let step = Duration::from_millis(20).min(budget.max(Duration::from_millis(1)));
    let mut waited = Duration::ZERO;
    while pool.active_threads() > 0 && waited < budget {
        thread::sleep(step);
        waited += step;
    }
    if pool.active_threads() > 0 {
        warn!(pool = %pool.name(), "shutdown wait timed out with worker threads still active");
    }
}

static MACHINE: OnceLock<ThreadMachine> = OnceLock::new();

/// The process-wide dispatcher, lazily built on first access and registered
/// to shut down cooperatively at process exit.
pub fn global() -> &'static ThreadMachine {
    MACHINE.get_or_init(|| {
        register_atexit_hook();
        ThreadMachine::default()
    })
}

/// Default shutdown-hook wait budget, per §6's configuration defaults.
const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

extern "C" fn run_atexit_shutdown() {
    if let Some(machine) = MACHINE.get() {
        machine.shutdown(DEFAULT_SHUTDOWN_WAIT);
    }
}

#[allow(unsafe_code)]
fn register_atexit_hook() {
    // SAFETY: `run_atexit_shutdown` has the `extern "C" fn()` signature
    // `atexit` requires, does no allocation beyond what `ThreadMachine`
    // already performs under its own locks, and never unwinds across the
    // FFI boundary (the panic is caught per-task inside `execute_in_thread`,
    // well before this runs).
    unsafe {
        libc::atexit(run_atexit_shutdown);
    }
}
