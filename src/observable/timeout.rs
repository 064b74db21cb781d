//! Deadline on the first notification of a stream.

use crate::error::StreamError;
use crate::observable::{Observable, Observer};
use crate::subscription::Emitter;
use crossbeam_channel::{after, bounded, select, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Forwards everything, signalling the timer on the first event.
struct TimeoutObserver<T> {
    downstream: Emitter<T>,
    armed: Sender<()>,
}

impl<T> TimeoutObserver<T> {
    fn disarm(&self) {
        let _ = self.armed.try_send(());
    }
}

impl<T: Send + 'static> Observer<T> for TimeoutObserver<T> {
    fn on_next(&mut self, value: T) {
        self.disarm();
        self.downstream.next(value);
    }

    fn on_error(&mut self, err: StreamError) {
        self.disarm();
        self.downstream.error(err);
    }

    fn on_completed(&mut self) {
        self.disarm();
        self.downstream.complete();
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Bound the wait for the first notification.
    ///
    /// Identity pass-through once the source has produced anything; if
    /// nothing arrives within `deadline`, the stream terminates with
    /// [`StreamError::Timeout`] and the source subscription is cancelled.
    pub fn timeout(&self, deadline: Duration) -> Observable<T> {
        let source = self.clone();

        Observable::create(move |emitter: Emitter<T>| {
            let (armed, first_event) = bounded(1);
            let source_handle = source.subscribe(TimeoutObserver {
                downstream: emitter.clone(),
                armed,
            });
            emitter.cancellation().add_child(source_handle.clone());

            // Race the deadline against the first event. A dropped sender
            // (source wound down) also settles the race.
            thread::spawn(move || {
                select! {
                    recv(first_event) -> _ => {}
                    recv(after(deadline)) -> _ => {
                        debug!(?deadline, "first notification missed deadline");
                        emitter.error(StreamError::Timeout(deadline));
                        source_handle.cancel();
                    }
                }
            });
        })
    }
}
