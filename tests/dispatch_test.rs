//! Integration tests over the public call-site surface in `taskloom::api`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use taskloom::api::{
    begin_thread_group, cancel_timer, end_thread_group, run_on_timer, run_once, thread_runnable,
    with_timeout,
};
use taskloom::core::registry::InstanceHandle;

#[test]
fn run_once_is_scoped_per_instance() {
    let a: InstanceHandle = Arc::new(());
    let b: InstanceHandle = Arc::new(());
    let a_runs = Arc::new(AtomicUsize::new(0));
    let b_runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let a_runs = Arc::clone(&a_runs);
        run_once(&a, 100, move || {
            a_runs.fetch_add(1, Ordering::SeqCst);
        });
    }
    for _ in 0..4 {
        let b_runs = Arc::clone(&b_runs);
        run_once(&b, 100, move || {
            b_runs.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn thread_group_wait_aggregates_parallel_work() {
    begin_thread_group();
    let total = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let total = Arc::clone(&total);
        thread_runnable(false, "", true, move || {
            total.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    let completed = end_thread_group(Duration::from_secs(5)).unwrap();
    assert_eq!(completed, 20);
    assert_eq!(total.load(Ordering::SeqCst), 20);
}

#[test]
fn periodic_timer_fires_on_interval() {
    let instance: InstanceHandle = Arc::new(());
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticks2 = Arc::clone(&ticks);

    run_on_timer(
        &instance,
        7,
        Duration::from_millis(0),
        Duration::from_millis(25),
        move || {
            ticks2.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        sleep(Duration::from_millis(20));
    }
    assert!(ticks.load(Ordering::SeqCst) >= 3);
    cancel_timer(&instance, 7);
}

#[test]
fn poolable_dispatch_to_a_named_pool_runs_the_job() {
    let done = Arc::new(AtomicUsize::new(0));
    let done2 = Arc::clone(&done);
    thread_runnable(true, "reports-pool", false, move || {
        done2.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap()
    .wait()
    .unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn timeout_returns_early_and_sets_the_interrupt_flag() {
    let started = Instant::now();
    let err = with_timeout(Duration::from_millis(40), |flag| {
        while !flag.is_set() {
            sleep(Duration::from_millis(5));
        }
    })
    .unwrap_err();
    assert!(!err.is_shutdown());
    assert!(started.elapsed() < Duration::from_secs(1));
}
