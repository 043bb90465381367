//! Lifecycle fan-out to external listeners

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::LlmError;
use crate::types::Usage;

/// Observer of per-request lifecycle events
///
/// Called on the dispatching task, so implementations must return quickly.
/// Every method defaults to a no-op.
pub trait LifecycleListener: Send + Sync {
    /// Dispatch began
    fn on_start(&self, _id: u64) {}

    /// Dispatch succeeded, with usage when the backend reported it
    fn on_done(&self, _id: u64, _usage: Option<&Usage>) {}

    /// Dispatch failed
    fn on_error(&self, _id: u64, _error: &LlmError) {}

    /// Dispatch finished, whatever the outcome
    fn on_finally(&self, _id: u64) {}
}

/// Registry of lifecycle listeners
///
/// A panicking listener is logged and skipped; it never reaches the dispatcher.
#[derive(Default)]
pub struct LifecycleNotifier {
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl LifecycleNotifier {
    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify `on_start`
    pub fn start(&self, id: u64) {
        self.each("on_start", |l| l.on_start(id));
    }

    /// Notify `on_done`
    pub fn done(&self, id: u64, usage: Option<&Usage>) {
        self.each("on_done", |l| l.on_done(id, usage));
    }

    /// Notify `on_error`
    pub fn error(&self, id: u64, error: &LlmError) {
        self.each("on_error", |l| l.on_error(id, error));
    }

    /// Notify `on_finally`
    pub fn finally(&self, id: u64) {
        self.each("on_finally", |l| l.on_finally(id));
    }

    fn each(&self, event: &'static str, f: impl Fn(&dyn LifecycleListener)) {
        // Snapshot so a listener may subscribe without deadlocking
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();

        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                tracing::error!(event, "lifecycle listener panicked");
            }
        }
    }
}

/// Fires `on_finally` exactly once when dropped
///
/// Covers dispatch futures that are dropped mid-flight as well as every
/// normal exit path.
pub(crate) struct FinallyGuard<'a> {
    notifier: &'a LifecycleNotifier,
    id: u64,
}

impl<'a> FinallyGuard<'a> {
    /// Emit `on_start` and arm the guard
    pub(crate) fn start(notifier: &'a LifecycleNotifier, id: u64) -> Self {
        notifier.start(id);
        Self { notifier, id }
    }
}

impl Drop for FinallyGuard<'_> {
    fn drop(&mut self) {
        self.notifier.finally(self.id);
    }
}
