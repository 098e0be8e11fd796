//! # Taskloom
//!
//! A process-wide task dispatch and lifecycle framework: bounded and cached
//! thread pools, run-once memoization, periodic timers, cooperative
//! timeouts, thread groups, and graceful process-exit shutdown.
//!
//! ## Core Problem Solved
//!
//! Long-lived services accumulate ad-hoc concurrency: one-off background
//! threads, hand-rolled "only do this once" flags, timers nobody remembers
//! to cancel, and no coordinated way to tell in-flight work the process is
//! going down. Taskloom centralizes that bookkeeping behind a small,
//! process-wide dispatcher:
//!
//! - **Run-once guarantees** scoped to an `(instance, call site)` pair, not
//!   a single global flag — distinct instances run independently.
//! - **Periodic timers** bound the same way, self-cancelling once their
//!   owning instance is no longer reachable.
//! - **Cooperative timeouts** that hand the task body an interrupt flag
//!   instead of killing its thread.
//! - **Thread groups** for "dispatch N tasks, wait for all of them" without
//!   hand-rolled barriers.
//! - **Cooperative shutdown**, checked between units of work and raised as
//!   a distinguished error that's never mistaken for a task failure.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use taskloom::api::{begin_thread_group, end_thread_group, thread_runnable};
//!
//! begin_thread_group();
//! for i in 0..4 {
//!     thread_runnable(false, "", true, move || println!("task {i}")).unwrap();
//! }
//! end_thread_group(Duration::from_secs(5)).unwrap();
//! ```
//!
//! For complete examples, see the integration tests under `tests/`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// The external call-site surface: `run_once`, `run_on_timer`,
/// `with_timeout`, `thread_runnable`, thread groups, and shutdown.
pub mod api;
/// Builders to construct framework components from configuration.
pub mod builders;
/// Configuration models for pool sizing.
pub mod config;
/// Task dispatch and lifecycle primitives: pools, timers, run-once,
/// registries, thread groups, and cooperative shutdown.
pub mod core;
/// Low-level synchronization primitives the framework is built on, exposed
/// directly for callers who need them without the rest of the framework.
pub mod condvar;
/// Low-level synchronization primitives the framework is built on, exposed
/// directly for callers who need them without the rest of the framework.
pub mod mutex;
/// Low-level synchronization primitives the framework is built on, exposed
/// directly for callers who need them without the rest of the framework.
pub mod once;
/// Low-level synchronization primitives the framework is built on, exposed
/// directly for callers who need them without the rest of the framework.
pub mod rwlock;
/// Shared utilities.
pub mod util;

pub use condvar::Condvar;
pub use mutex::{MappedMutexGuard, Mutex, MutexGuard};
pub use once::{Once, OnceCell};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
