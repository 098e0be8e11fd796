//! Thread pool factory: bounded pools with caller-runs saturation, and
//! cached, fully elastic pools.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex, WaitTimeoutResult};
use tracing::{debug, warn};

use super::error::CoreError;
use super::rolling_id::RollingId;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide pool-id source; each [`Pool`] gets one on construction so
/// its worker thread names are unique across the whole process, not just
/// within that pool.
static POOL_ID: RollingId = RollingId::new();

/// Sizing and lifecycle knobs for a pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Threads kept alive even when idle.
    pub core_threads: usize,
    /// Ceiling on total worker threads (core + overflow).
    pub max_threads: usize,
    /// How long a non-core (overflow) worker waits for work before exiting.
    pub idle_ttl: Duration,
    /// Backlog capacity for a bounded pool's queue. Ignored by
    /// [`Pool::cached`].
    pub queue_capacity: usize,
}

/// Baseline core-thread count when the machine has fewer CPUs than this.
const DEFAULT_INIT: usize = 5;

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            core_threads: DEFAULT_INIT.min(cpus),
            max_threads: (cpus + 1).max(DEFAULT_INIT + 1),
            idle_ttl: Duration::from_secs(60),
            queue_capacity: 100,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Kind {
    Bounded,
    Cached,
}

/// Why a submitted task did not complete successfully. Kept distinct from a
/// plain panic message so callers (notably [`crate::core::group::GroupLatch`])
/// can tell a cooperative-shutdown abort apart from an ordinary panic and
/// re-raise it unchanged rather than wrapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The task body observed (and propagated, by panicking with
    /// [`CoreError::Shutdown`]) a cooperative shutdown signal.
    Shutdown,
    /// The task body panicked for any other reason; the payload stringified.
    Panicked(String),
}

struct TaskState {
    done: bool,
    failure: Option<TaskFailure>,
}

/// A handle to a single submitted task, for callers (notably
/// [`crate::core::group::GroupLatch`]) that must block until it finishes.
pub struct TaskHandle {
    state: Mutex<TaskState>,
    cv: Condvar,
}

/// Classify a caught panic payload: a boxed [`CoreError::Shutdown`] is
/// reported as [`TaskFailure::Shutdown`]; everything else is stringified.
fn classify_panic(payload: &(dyn std::any::Any + Send)) -> TaskFailure {
    if let Some(err) = payload.downcast_ref::<CoreError>() {
        if err.is_shutdown() {
            return TaskFailure::Shutdown;
        }
        return TaskFailure::Panicked(err.to_string());
    }
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker task panicked".to_string());
    TaskFailure::Panicked(message)
}

impl TaskHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState {
                done: false,
                failure: None,
            }),
            cv: Condvar::new(),
        })
    }

    fn finish(&self, failure: Option<TaskFailure>) {
        let mut state = self.state.lock();
        state.done = true;
        state.failure = failure;
        self.cv.notify_all();
    }

    /// Block until the task finishes. Returns `Err` describing the failure
    /// if the task did not complete successfully.
    pub fn wait(&self) -> Result<(), TaskFailure> {
        let mut state = self.state.lock();
        while !state.done {
            self.cv.wait(&mut state);
        }
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    /// Block until the task finishes or `timeout` elapses, whichever comes
    /// first. `None` means the deadline passed with the task still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), TaskFailure>> {
        let mut state = self.state.lock();
        let mut remaining = timeout;
        while !state.done {
            let started = std::time::Instant::now();
            let result: WaitTimeoutResult = self.cv.wait_for(&mut state, remaining);
            if state.done {
                break;
            }
            if result.timed_out() {
                return None;
            }
            remaining = remaining.saturating_sub(started.elapsed());
        }
        Some(match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        })
    }

    /// True if the task has finished (successfully or not).
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }
}

struct Shared {
    name: String,
    kind: Kind,
    pool_id: i64,
    core_threads: usize,
    max_threads: usize,
    idle_ttl: Duration,
    active: AtomicUsize,
    shutdown: AtomicBool,
    worker_id: RollingId,
    receiver: Receiver<Job>,
}

/// A worker-thread pool. Created via [`Pool::bounded`] or [`Pool::cached`].
pub struct Pool {
    shared: Arc<Shared>,
    sender: Sender<Job>,
}

impl Pool {
    /// A pool with a bounded backlog. Once `max_threads` are running and the
    /// queue is full, [`Pool::execute`] runs the task on the *calling*
    /// thread instead of rejecting it (caller-runs saturation policy) —
    /// submissions never block or fail merely because the pool is busy.
    #[must_use]
    pub fn bounded(name: impl Into<String>, config: PoolConfig) -> Self {
        let (tx, rx) = bounded(config.queue_capacity.max(1));
        Self::new(name.into(), Kind::Bounded, config, tx, rx)
    }

    /// An unbounded, fully elastic pool: no core threads, workers spun up on
    /// demand and reaped after `idle_ttl` with nothing to do. Suited to
    /// short, bursty, or blocking work — e.g. [`crate::core::timeout`]
    /// bodies that may be abandoned at their deadline.
    #[must_use]
    pub fn cached(name: impl Into<String>, mut config: PoolConfig) -> Self {
        config.core_threads = 0;
        config.max_threads = usize::MAX;
        let (tx, rx) = unbounded();
        Self::new(name.into(), Kind::Cached, config, tx, rx)
    }

    fn new(name: String, kind: Kind, config: PoolConfig, tx: Sender<Job>, rx: Receiver<Job>) -> Self {
        let shared = Arc::new(Shared {
            name,
            kind,
            pool_id: POOL_ID.next(),
            core_threads: config.core_threads,
            max_threads: config.max_threads,
            idle_ttl: config.idle_ttl,
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            worker_id: RollingId::new(),
            receiver: rx,
        });
        for _ in 0..shared.core_threads {
            spawn_worker(&shared, true);
        }
        Self { shared, sender: tx }
    }

    /// Submit `job`, returning a handle a caller can wait on.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<Arc<TaskHandle>, CoreError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(CoreError::Shutdown);
        }
        let handle = TaskHandle::new();
        let handle_for_job = Arc::clone(&handle);
        let wrapped: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(job));
            let failure = result.err().map(|p| classify_panic(p.as_ref()));
            handle_for_job.finish(failure);
        });

        match self.sender.try_send(wrapped) {
            Ok(()) => {
                self.maybe_grow();
                Ok(handle)
            }
            Err(crossbeam_channel::TrySendError::Full(job)) => {
                if self.shared.active.load(Ordering::Acquire) < self.shared.max_threads {
                    spawn_worker(&self.shared, false);
                    // Queue still full from this thread's point of view;
                    // block briefly so the freshly spawned worker can drain
                    // room for it.
                    self.sender
                        .send(job)
                        .map_err(|_| CoreError::ThreadFramework("pool queue closed".into()))?;
                    Ok(handle)
                } else {
                    warn!(pool = %self.shared.name, "saturated; running task on caller's thread");
                    job();
                    Ok(handle)
                }
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                Err(CoreError::ThreadFramework("pool queue closed".into()))
            }
        }
    }

    /// Fire-and-forget submission; discards the handle.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<(), CoreError> {
        self.submit(job).map(|_| ())
    }

    fn maybe_grow(&self) {
        if self.shared.kind == Kind::Cached
            && self.shared.active.load(Ordering::Acquire) == 0
            && !self.sender.is_empty()
        {
            spawn_worker(&self.shared, false);
        }
    }

    /// Stop accepting new submissions. Already-queued work still runs;
    /// worker threads drain the queue and then exit once they observe the
    /// channel is empty and disconnected.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    /// Pool identity, used in worker thread names and logs.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current worker thread count (core + overflow).
    pub fn active_threads(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }
}

fn spawn_worker(shared: &Arc<Shared>, is_core: bool) {
    shared.active.fetch_add(1, Ordering::AcqRel);
    let shared = Arc::clone(shared);
    let worker_num = shared.worker_id.next();
    let kind = match shared.kind {
        Kind::Bounded => "bounded",
        Kind::Cached => "cached",
    };
    let thread_name = format!(
        "{}-{}poolID-{}-threadID-{}",
        shared.name, kind, shared.pool_id, worker_num
    );
    let builder = thread::Builder::new().name(thread_name.clone());
    let spawned = builder.spawn(move || {
        debug!(thread = %thread_name, "worker started");
        loop {
            let job = if is_core {
                shared.receiver.recv()
            } else {
                shared.receiver.recv_timeout(shared.idle_ttl)
            };
            match job {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => break,
                Err(_) => break,
            }
        }
        shared.active.fetch_sub(1, Ordering::AcqRel);
        debug!(thread = %thread_name, "worker stopped");
    });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn worker thread");
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
}
