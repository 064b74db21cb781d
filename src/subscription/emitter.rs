//! Serialized delivery gate between a producer and its observer.

use crate::error::StreamError;
use crate::observable::Observer;
use crate::subscription::Cancellation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Delivery state shared between an emitter and its cancellation hook.
struct Gate<T> {
    observer: Mutex<Box<dyn Observer<T> + Send>>,
    /// A terminal was delivered, or the subscription was cancelled.
    closed: AtomicBool,
}

/// Producer-side handle for pushing notifications to one subscription.
///
/// Every delivery happens under a single lock, so notifications reach the
/// observer serialized and atomically. The first terminal wins; anything
/// after it is dropped. Cancelling the subscription closes the gate under
/// the same lock, so `cancel` returning means no in-flight delivery
/// remains. For that reason `cancel` must not be called from inside this
/// subscription's own observer callbacks; consume through an
/// [`EventHandle`](crate::subscription::EventHandle) or cancel from
/// another thread instead.
pub struct Emitter<T> {
    gate: Arc<Gate<T>>,
    cancel: Cancellation,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> Emitter<T> {
    /// Wrap an observer for one subscription.
    ///
    /// Registers a hook on `cancel` that closes the gate.
    pub fn new(observer: Box<dyn Observer<T> + Send>, cancel: Cancellation) -> Self
    where
        T: 'static,
    {
        let gate = Arc::new(Gate {
            observer: Mutex::new(observer),
            closed: AtomicBool::new(false),
        });

        let hook_gate = Arc::clone(&gate);
        cancel.on_cancel(move || {
            // Wait out any in-flight delivery, then close.
            let _guard = hook_gate.observer.lock();
            hook_gate.closed.store(true, Ordering::SeqCst);
        });

        Self { gate, cancel }
    }

    /// Deliver a value. Dropped if the gate is closed.
    pub fn next(&self, value: T) {
        let mut observer = self.gate.observer.lock();
        if self.gate.closed.load(Ordering::SeqCst) {
            return;
        }
        observer.on_next(value);
    }

    /// Deliver the failure terminal. First terminal wins.
    pub fn error(&self, err: StreamError) {
        let mut observer = self.gate.observer.lock();
        if self.gate.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        observer.on_error(err);
    }

    /// Deliver the success terminal. First terminal wins.
    pub fn complete(&self) {
        let mut observer = self.gate.observer.lock();
        if self.gate.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        observer.on_completed();
    }

    /// True once a terminal was delivered or the subscription cancelled.
    /// Producers poll this to stop early.
    pub fn is_closed(&self) -> bool {
        self.gate.closed.load(Ordering::SeqCst)
    }

    /// The cancellation handle governing this subscription.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::observer;
    use crate::types::Notification;
    use std::sync::Arc;

    fn recording_emitter() -> (Emitter<i32>, Arc<Mutex<Vec<Notification<i32>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (Arc::clone(&seen), Arc::clone(&seen), Arc::clone(&seen));
        let obs = observer(
            move |v| a.lock().push(Notification::Next(v)),
            move |e| b.lock().push(Notification::Error(e)),
            move || c.lock().push(Notification::Completed),
        );
        let emitter = Emitter::new(Box::new(obs), Cancellation::new());
        (emitter, seen)
    }

    #[test]
    fn test_first_terminal_wins() {
        let (emitter, seen) = recording_emitter();

        emitter.next(1);
        emitter.complete();
        emitter.error(StreamError::Stream("late".into()));
        emitter.complete();

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![Notification::Next(1), Notification::Completed]
        );
    }

    #[test]
    fn test_nothing_after_terminal() {
        let (emitter, seen) = recording_emitter();

        emitter.error(StreamError::Stream("boom".into()));
        emitter.next(2);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Notification::Error(_)));
    }

    #[test]
    fn test_cancel_closes_gate() {
        let (emitter, seen) = recording_emitter();

        emitter.next(1);
        emitter.cancellation().cancel();
        emitter.next(2);
        emitter.complete();

        let seen = seen.lock();
        assert_eq!(*seen, vec![Notification::Next(1)]);
        assert!(emitter.is_closed());
    }
}
