//! Channel-backed consumer handle for one subscription.

use crate::subscription::Cancellation;
use crate::types::Notification;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};

/// Handle to consume a subscription as a stream of notifications.
///
/// Built by [`Observable::subscribe_channel`](crate::Observable::subscribe_channel).
/// Owns the subscription's [`Cancellation`] and releases it on drop, so a
/// handle going out of scope never leaks a live subscription.
pub struct EventHandle<T> {
    receiver: Receiver<Notification<T>>,
    cancellation: Cancellation,
}

impl<T> EventHandle<T> {
    pub(crate) fn new(receiver: Receiver<Notification<T>>, cancellation: Cancellation) -> Self {
        Self {
            receiver,
            cancellation,
        }
    }

    /// Receive the next notification (blocking).
    pub fn recv(&self) -> Result<Notification<T>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification (non-blocking).
    pub fn try_recv(&self) -> Result<Notification<T>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Notification<T>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Stop the subscription now instead of at drop.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The cancellation handle governing this subscription.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}

impl<T> Drop for EventHandle<T> {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked on a full buffer unblocks
        // before cancel waits on the delivery lock.
        let (_, dead) = crossbeam_channel::bounded(0);
        drop(std::mem::replace(&mut self.receiver, dead));
        self.cancellation.cancel();
    }
}
