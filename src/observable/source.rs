//! Observable producers and the observer contract.

use crate::error::StreamError;
use crate::subscription::{Cancellation, Emitter, EventHandle};
use crate::types::Notification;
use crossbeam_channel::{bounded, SendTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Receiver of a well-formed notification sequence: zero or more
/// `on_next`, then at most one of `on_error` / `on_completed`.
pub trait Observer<T>: Send {
    fn on_next(&mut self, value: T);
    fn on_error(&mut self, err: StreamError);
    fn on_completed(&mut self);
}

/// Observer built from three closures. See [`observer`].
pub struct FnObserver<N, E, C> {
    next: N,
    error: E,
    completed: C,
}

/// Build an observer from `on_next`, `on_error`, and `on_completed`
/// closures.
pub fn observer<T, N, E, C>(next: N, error: E, completed: C) -> FnObserver<N, E, C>
where
    N: FnMut(T) + Send,
    E: FnMut(StreamError) + Send,
    C: FnMut() + Send,
{
    FnObserver {
        next,
        error,
        completed,
    }
}

impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    N: FnMut(T) + Send,
    E: FnMut(StreamError) + Send,
    C: FnMut() + Send,
{
    fn on_next(&mut self, value: T) {
        (self.next)(value);
    }

    fn on_error(&mut self, err: StreamError) {
        (self.error)(err);
    }

    fn on_completed(&mut self) {
        (self.completed)();
    }
}

/// Observer funnelling notifications into a bounded channel.
///
/// A full buffer blocks the producer (backpressure), but the wait is
/// chunked so a cancelled subscription can still drop the delivery
/// instead of holding the gate forever. A disconnected receiver drops
/// deliveries outright.
struct ChannelObserver<T> {
    sender: Sender<Notification<T>>,
    cancel: Cancellation,
}

impl<T: Send> ChannelObserver<T> {
    fn push(&self, notification: Notification<T>) {
        let mut pending = notification;
        loop {
            match self
                .sender
                .send_timeout(pending, Duration::from_millis(10))
            {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    pending = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}

impl<T: Send> Observer<T> for ChannelObserver<T> {
    fn on_next(&mut self, value: T) {
        self.push(Notification::Next(value));
    }

    fn on_error(&mut self, err: StreamError) {
        self.push(Notification::Error(err));
    }

    fn on_completed(&mut self) {
        self.push(Notification::Completed);
    }
}

/// A description of how to produce a stream of `T`.
///
/// Owns no per-subscription state: each `subscribe` allocates fresh
/// execution state and runs the producer on its own thread, so
/// independent subscriptions never block each other.
pub struct Observable<T> {
    producer: Arc<dyn Fn(Emitter<T>) + Send + Sync>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build an observable from a producer function.
    ///
    /// The producer runs once per subscription, on a dedicated thread,
    /// pushing notifications through the emitter it is given. Producers
    /// doing repeated work should poll [`Emitter::is_closed`] to stop
    /// early after cancellation.
    pub fn create(producer: impl Fn(Emitter<T>) + Send + Sync + 'static) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Emits each item in order, then completes.
    pub fn of(items: impl Into<Vec<T>>) -> Self
    where
        T: Clone + Sync,
    {
        let items = items.into();
        Self::create(move |emitter| {
            for item in items.iter().cloned() {
                if emitter.is_closed() {
                    return;
                }
                emitter.next(item);
            }
            emitter.complete();
        })
    }

    /// Completes without emitting anything.
    pub fn empty() -> Self {
        Self::create(|emitter| emitter.complete())
    }

    /// Fails without emitting anything.
    pub fn throw(err: StreamError) -> Self {
        Self::create(move |emitter| emitter.error(err.clone()))
    }

    /// Begin an independent execution of this observable.
    ///
    /// Returns the handle that stops it. Delivery to `observer` is
    /// serialized and atomic per notification; nothing is delivered after
    /// a terminal or after `cancel` returns.
    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> Cancellation {
        self.spawn_with(Box::new(observer), Cancellation::new())
    }

    /// Subscribe and consume through a bounded channel.
    ///
    /// The producer blocks when `buffer` notifications are pending
    /// (backpressure). Dropping the returned handle cancels the
    /// subscription.
    pub fn subscribe_channel(&self, buffer: usize) -> EventHandle<T> {
        let (sender, receiver) = bounded(buffer);
        let cancel = Cancellation::new();
        let observer = ChannelObserver {
            sender,
            cancel: cancel.clone(),
        };
        self.spawn_with(Box::new(observer), cancel.clone());
        EventHandle::new(receiver, cancel)
    }

    fn spawn_with(&self, observer: Box<dyn Observer<T> + Send>, cancel: Cancellation) -> Cancellation {
        let emitter = Emitter::new(observer, cancel.clone());
        let producer = Arc::clone(&self.producer);
        trace!("subscription started");
        thread::spawn(move || producer(emitter));
        cancel
    }
}
