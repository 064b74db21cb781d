//! Cancellation handles for subscription teardown.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Shared state behind a cancellation handle.
struct CancelState {
    cancelled: AtomicBool,
    /// Child subscriptions cancelled together with this one.
    children: Mutex<Vec<Cancellation>>,
    /// Teardown hooks, each run exactly once.
    hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

/// Caller-held right to stop a running subscription.
///
/// Cancelling is idempotent. Once `cancel` returns, no further
/// notifications are delivered for this subscription or any child
/// registered on it.
#[derive(Clone)]
pub struct Cancellation {
    state: Arc<CancelState>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                children: Mutex::new(Vec::new()),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stop the subscription and everything registered on it.
    ///
    /// The first call runs all hooks and cancels all children; later calls
    /// have no observable effect.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!("cancellation invoked");

        let hooks = std::mem::take(&mut *self.state.hooks.lock());
        for hook in hooks {
            hook();
        }

        let children = std::mem::take(&mut *self.state.children.lock());
        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Register a child cancelled together with this handle.
    ///
    /// If the handle is already cancelled, the child is cancelled
    /// immediately.
    pub fn add_child(&self, child: Cancellation) {
        if self.is_cancelled() {
            child.cancel();
            return;
        }
        let mut children = self.state.children.lock();
        if self.is_cancelled() {
            // Raced with cancel: the drain already happened.
            drop(children);
            child.cancel();
            return;
        }
        children.push(child);
    }

    /// Register a teardown hook, run exactly once.
    ///
    /// If the handle is already cancelled, the hook runs immediately on
    /// the calling thread.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            hook();
            return;
        }
        let mut hooks = self.state.hooks.lock();
        if self.is_cancelled() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}
