//! Periodic-timer controller: binds `(instance, attribute)` to a repeating
//! timer.

use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, warn};

use super::error::CoreError;
use super::registry::{InstanceHandle, InstanceRegistry};
use super::rolling_id::RollingId;

static TIMER_ID: RollingId = RollingId::new();

/// A cancellable handle to a running periodic timer.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl TimerHandle {
    /// Request cancellation. The background thread observes this on its
    /// next wakeup and exits; in-flight callback invocations are not
    /// interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// What the registry stores per `(instance, attribute)`: the handle to the
/// running timer.
struct TimerBinding {
    handle: Arc<TimerHandle>,
}

/// Binds `(instance, attribute)` to a repeating background timer.
pub struct PeriodicTimerController<A> {
    registry: InstanceRegistry<A, TimerBinding>,
    lock: Mutex<()>,
}

impl<A> Default for PeriodicTimerController<A>
where
    A: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> PeriodicTimerController<A>
where
    A: Eq + Hash + Clone + Send + 'static,
{
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: InstanceRegistry::new(),
            lock: Mutex::new(()),
        }
    }

    /// Bind `(instance, attr)` to a timer that fires `callback` first after
    /// `delay`, then every `period`.
    ///
    /// If `(instance, attr)` is already bound, `callback` runs inline and
    /// synchronously instead (exceptions propagate to the caller), and this
    /// returns `Ok(false)` ("not added"). Otherwise a new timer is created
    /// and this returns `Ok(true)`.
    ///
    /// Panics inside the *scheduled* callback are caught and logged — the
    /// timer must survive a faulty tick — but a panic from the *inline* run
    /// above propagates normally, matching a direct call.
    pub fn add(
        &self,
        instance: &InstanceHandle,
        attr: A,
        delay: Duration,
        period: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<bool, CoreError> {
        if period.is_zero() {
            return Err(CoreError::InvalidArgument(
                "period must be at least 1ms".into(),
            ));
        }

        let _guard = self.lock.lock();
        if self.registry.contains(instance, &attr) {
            drop(_guard);
            callback();
            return Ok(false);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_for_thread = Arc::clone(&cancelled);
        let weak_instance: Weak<_> = Arc::downgrade(instance);
        let timer_id = TIMER_ID.next();

        let join = thread::Builder::new()
            .name(format!("timer-{timer_id}"))
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "failed to build timer runtime");
                        return;
                    }
                };
                rt.block_on(async move {
                    tokio::time::sleep(delay).await;
                    loop {
                        if cancelled_for_thread.load(Ordering::Acquire) {
                            break;
                        }
                        if weak_instance.upgrade().is_none() {
                            // Owning instance is gone; self-terminate.
                            break;
                        }
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(&callback)) {
                            warn!(?panic, "periodic timer callback panicked; timer continues");
                        }
                        tokio::time::sleep(period).await;
                    }
                });
            })
            .map_err(|e| CoreError::ThreadFramework(e.to_string()))?;

        let handle = Arc::new(TimerHandle {
            cancelled,
            join: Mutex::new(Some(join)),
        });
        self.registry.check_and_add(instance, attr, TimerBinding { handle });
        Ok(true)
    }

    /// Cancel and forget the timer bound to `(instance, attr)`, if any.
    /// Returns whether a binding was found.
    pub fn cancel(&self, instance: &InstanceHandle, attr: &A) -> bool {
        let _guard = self.lock.lock();
        match self.registry.take(instance, attr) {
            Some(binding) => {
                binding.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// True if `(instance, attr)` currently has an active timer.
    pub fn contains(&self, instance: &InstanceHandle, attr: &A) -> bool {
        self.registry.contains(instance, attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn rejects_zero_period() {
        let ctl: PeriodicTimerController<u64> = PeriodicTimerController::new();
        let instance: InstanceHandle = Arc::new(());
        let err = ctl
            .add(&instance, 1, Duration::ZERO, Duration::ZERO, || {})
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn second_add_for_same_pair_runs_inline_and_returns_false() {
        let ctl: PeriodicTimerController<u64> = PeriodicTimerController::new();
        let instance: InstanceHandle = Arc::new(());
        let inline_runs = Arc::new(AtomicUsize::new(0));

        let first = ctl
            .add(&instance, 1, Duration::from_secs(60), Duration::from_secs(60), || {})
            .unwrap();
        assert!(first);

        let inline_runs2 = Arc::clone(&inline_runs);
        let second = ctl
            .add(
                &instance,
                1,
                Duration::from_secs(60),
                Duration::from_secs(60),
                move || {
                    inline_runs2.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
        assert!(!second);
        assert_eq!(inline_runs.load(Ordering::SeqCst), 1);

        ctl.cancel(&instance, &1);
    }

    #[test]
    fn fires_on_interval() {
        let ctl: PeriodicTimerController<u64> = PeriodicTimerController::new();
        let instance: InstanceHandle = Arc::new(());
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks2 = Arc::clone(&ticks);

        ctl.add(
            &instance,
            1,
            Duration::from_millis(0),
            Duration::from_millis(30),
            move || {
                ticks2.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(ticks.load(Ordering::SeqCst) >= 3);
        ctl.cancel(&instance, &1);
    }

    #[test]
    fn panicking_callback_is_caught_and_timer_survives() {
        let ctl: PeriodicTimerController<u64> = PeriodicTimerController::new();
        let instance: InstanceHandle = Arc::new(());
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks2 = Arc::clone(&ticks);

        ctl.add(
            &instance,
            1,
            Duration::from_millis(0),
            Duration::from_millis(20),
            move || {
                ticks2.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            },
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(ticks.load(Ordering::SeqCst) >= 3);
        ctl.cancel(&instance, &1);
    }

    #[test]
    fn timer_self_terminates_once_instance_is_dropped() {
        let ctl: PeriodicTimerController<u64> = PeriodicTimerController::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        {
            let instance: InstanceHandle = Arc::new(());
            let ticks2 = Arc::clone(&ticks);
            ctl.add(
                &instance,
                1,
                Duration::from_millis(0),
                Duration::from_millis(10),
                move || {
                    ticks2.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
            thread::sleep(Duration::from_millis(50));
        }
        // instance dropped; controller's registry entry is also gone.
        let after_drop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        // a couple of extra ticks may land racily before the timer notices
        // the instance is gone, but it must not keep going indefinitely.
        assert!(ticks.load(Ordering::SeqCst) <= after_drop + 2);
    }
}
