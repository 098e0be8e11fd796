//! Thread-event listener chain: hooks run before and after every dispatched
//! task, and on uncaught task errors.

use parking_lot::RwLock;
use tracing::error;

/// Observes the lifecycle of tasks run through [`crate::core::machine::ThreadMachine`].
pub trait ThreadEventListener: Send + Sync {
    /// Called on the worker thread immediately before the task body runs.
    /// Returning `false` cancels the run: the body does not execute and
    /// [`Self::after_execution`] is not invoked either.
    fn before_execution(&self, thread_name: &str) -> bool {
        let _ = thread_name;
        true
    }

    /// Called on the worker thread immediately after the task body returns
    /// normally.
    fn after_execution(&self, thread_name: &str) {
        let _ = thread_name;
    }

    /// Called when the task body panicked. `message` is the captured panic
    /// payload, stringified. Returning `None` swallows the failure;
    /// returning `Some` surfaces it (possibly rewrapped) to the pool's
    /// default failure pathway.
    fn on_exception(&self, thread_name: &str, message: &str) -> Option<String> {
        let _ = thread_name;
        Some(message.to_string())
    }
}

/// The listener installed when nobody registers one: permits every run, is a
/// no-op on completion, and re-surfaces errors unchanged.
#[derive(Debug, Default)]
pub struct DefaultListener;

impl ThreadEventListener for DefaultListener {
    fn on_exception(&self, thread_name: &str, message: &str) -> Option<String> {
        error!(thread = thread_name, %message, "task failed");
        Some(message.to_string())
    }
}

/// A mutable chain of listeners, invoked in registration order. Registered
/// with [`crate::core::machine::ThreadMachine`]; every dispatched task walks
/// the chain at each lifecycle point.
#[derive(Default)]
pub struct DecoratingListener {
    chain: RwLock<Vec<Box<dyn ThreadEventListener>>>,
}

impl DecoratingListener {
    /// Start with no listeners registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to the chain.
    pub fn register(&self, listener: Box<dyn ThreadEventListener>) {
        self.chain.write().push(listener);
    }

    /// Number of currently registered listeners.
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// True if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ThreadEventListener for DecoratingListener {
    /// Cancels the run if *any* registered listener votes to cancel. Every
    /// listener is still consulted, in order, regardless of earlier votes.
    fn before_execution(&self, thread_name: &str) -> bool {
        let mut allow = true;
        for listener in self.chain.read().iter() {
            if !listener.before_execution(thread_name) {
                allow = false;
            }
        }
        allow
    }

    fn after_execution(&self, thread_name: &str) {
        for listener in self.chain.read().iter() {
            listener.after_execution(thread_name);
        }
    }

    /// Threads `message` through every listener in order, letting each
    /// swallow (`None`) or rewrite it; a listener that swallows still lets
    /// later listeners observe the original message, but the chain's final
    /// verdict is whatever the last listener in the chain returned.
    fn on_exception(&self, thread_name: &str, message: &str) -> Option<String> {
        let mut verdict = Some(message.to_string());
        for listener in self.chain.read().iter() {
            verdict = listener.on_exception(thread_name, message);
        }
        verdict
    }
}
