//! Merge combinator: fan each source item out through a worker into an
//! inner stream and merge all inner emissions into one output stream.

use crate::error::{Result, StreamError};
use crate::observable::{Observable, Observer};
use crate::subscription::{Cancellation, Emitter};
use crate::types::Ordinal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Which stream delivered a terminal error.
///
/// The erroring stream has already closed its own gate, so fail-fast
/// teardown must skip it: cancelling it from inside its own delivery
/// would deadlock on the gate lock.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Source,
    Inner(Ordinal),
}

/// Per-subscription bookkeeping for one merged stream.
struct MergeState {
    /// Handles of inner subscriptions, keyed by invocation ordinal.
    /// Entries may outlive their stream; cancelling a finished
    /// subscription is a no-op.
    inners: HashMap<Ordinal, Cancellation>,
    /// Inner subscriptions opened but not yet terminated.
    open: usize,
    /// Next ordinal to assign, in source order.
    next_ordinal: Ordinal,
    /// The source delivered its terminal.
    source_done: bool,
    /// Source subscription handle, for teardown.
    source: Option<Cancellation>,
    /// A terminal was delivered downstream; everything else stands down.
    finished: bool,
}

impl MergeState {
    fn new() -> Self {
        Self {
            inners: HashMap::new(),
            open: 0,
            next_ordinal: Ordinal::default(),
            source_done: false,
            source: None,
            finished: false,
        }
    }
}

struct Merge<B> {
    state: Mutex<MergeState>,
    downstream: Emitter<B>,
}

impl<B> Merge<B> {
    /// Fail-fast: deliver `err` as the single terminal and cancel the
    /// source and every sibling inner still open.
    fn fail(&self, err: StreamError, origin: Origin) {
        let (source, inners) = {
            let mut state = self.state.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            let source = state.source.take();
            let inners: Vec<Cancellation> = state
                .inners
                .drain()
                .filter(|(ordinal, _)| Origin::Inner(*ordinal) != origin)
                .map(|(_, handle)| handle)
                .collect();
            (source, inners)
        };

        debug!(%err, "merged stream failed");
        self.downstream.error(err);

        if origin != Origin::Source {
            if let Some(source) = source {
                source.cancel();
            }
        }
        for inner in inners {
            inner.cancel();
        }
    }

    /// An inner stream completed. Emits the merged terminal once the
    /// source is done and no inner remains open.
    fn inner_done(&self, ordinal: Ordinal) {
        let complete = {
            let mut state = self.state.lock();
            state.inners.remove(&ordinal);
            state.open = state.open.saturating_sub(1);
            let complete = !state.finished && state.source_done && state.open == 0;
            if complete {
                state.finished = true;
            }
            complete
        };
        if complete {
            self.downstream.complete();
        }
    }

    /// The source completed. Same completion conjunction as `inner_done`.
    fn source_complete(&self) {
        let complete = {
            let mut state = self.state.lock();
            state.source_done = true;
            state.source = None;
            let complete = !state.finished && state.open == 0;
            if complete {
                state.finished = true;
            }
            complete
        };
        if complete {
            self.downstream.complete();
        }
    }

    /// Outer cancellation: tear down source and all open inners.
    fn teardown(&self) {
        let (source, inners) = {
            let mut state = self.state.lock();
            state.finished = true;
            let source = state.source.take();
            let inners: Vec<Cancellation> =
                state.inners.drain().map(|(_, handle)| handle).collect();
            (source, inners)
        };
        if let Some(source) = source {
            source.cancel();
        }
        for inner in inners {
            inner.cancel();
        }
    }
}

/// Observer on the source stream; invokes the worker per item.
struct SourceObserver<B, F> {
    merge: Arc<Merge<B>>,
    worker: Arc<F>,
}

impl<A, B, F> Observer<A> for SourceObserver<B, F>
where
    A: Send,
    B: Send + 'static,
    F: Fn(A) -> Result<Observable<B>> + Send + Sync + 'static,
{
    fn on_next(&mut self, item: A) {
        // Assign the ordinal and open the slot before invoking the
        // worker, so the completion conjunction cannot fire while this
        // inner is being set up.
        let ordinal = {
            let mut state = self.merge.state.lock();
            if state.finished {
                return;
            }
            let ordinal = state.next_ordinal;
            state.next_ordinal = ordinal.next();
            state.open += 1;
            ordinal
        };

        // Worker runs outside the state lock: it may block, and sibling
        // inners must keep making progress while it does.
        let inner = match (self.worker)(item) {
            Ok(inner) => inner,
            Err(err) => {
                // Invocation failure is this item's inner stream erroring
                // immediately. Close its slot, then fail the merge.
                self.merge.state.lock().open -= 1;
                self.merge.fail(err, Origin::Inner(ordinal));
                return;
            }
        };

        let handle = inner.subscribe(InnerObserver {
            merge: Arc::clone(&self.merge),
            ordinal,
        });

        let stale = {
            let mut state = self.merge.state.lock();
            if state.finished {
                true
            } else {
                state.inners.insert(ordinal, handle.clone());
                false
            }
        };
        // The merge terminated while the worker was running; the fresh
        // inner must not keep working.
        if stale {
            handle.cancel();
        }
    }

    fn on_error(&mut self, err: StreamError) {
        self.merge.fail(err, Origin::Source);
    }

    fn on_completed(&mut self) {
        self.merge.source_complete();
    }
}

/// Observer on one inner stream; forwards values downstream.
struct InnerObserver<B> {
    merge: Arc<Merge<B>>,
    ordinal: Ordinal,
}

impl<B: Send + 'static> Observer<B> for InnerObserver<B> {
    fn on_next(&mut self, value: B) {
        // The downstream gate drops this after a terminal, so no state
        // check is needed here.
        self.merge.downstream.next(value);
    }

    fn on_error(&mut self, err: StreamError) {
        self.merge.fail(err, Origin::Inner(self.ordinal));
    }

    fn on_completed(&mut self) {
        self.merge.inner_done(self.ordinal);
    }
}

impl<A: Send + 'static> Observable<A> {
    /// Map each item to an inner stream via `worker` and merge all inner
    /// emissions into one output stream.
    ///
    /// The worker is invoked synchronously on each source item, in source
    /// order, and its stream is subscribed before the next item is
    /// processed. Inner emissions merge with no cross-stream ordering
    /// guarantee. The first error anywhere (source, inner, or the
    /// worker's `Err` arm) terminates the merged stream and cancels
    /// everything still open (fail-fast). Completion is emitted exactly
    /// once, after the source and every inner have completed.
    pub fn flat_map<B, F>(&self, worker: F) -> Observable<B>
    where
        B: Send + 'static,
        F: Fn(A) -> Result<Observable<B>> + Send + Sync + 'static,
    {
        let source = self.clone();
        let worker = Arc::new(worker);

        Observable::create(move |emitter: Emitter<B>| {
            let merge = Arc::new(Merge {
                state: Mutex::new(MergeState::new()),
                downstream: emitter.clone(),
            });

            // Hook before subscribing, so an already-cancelled outer
            // handle tears the source down instead of racing it.
            let teardown = Arc::clone(&merge);
            emitter.cancellation().on_cancel(move || teardown.teardown());

            let source_handle = source.subscribe(SourceObserver {
                merge: Arc::clone(&merge),
                worker: Arc::clone(&worker),
            });

            let stale = {
                let mut state = merge.state.lock();
                if state.finished {
                    true
                } else {
                    state.source = Some(source_handle.clone());
                    false
                }
            };
            if stale {
                source_handle.cancel();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::EventHandle;
    use crate::types::Notification;
    use std::thread;
    use std::time::Duration;

    fn drain<T: Send + 'static>(handle: &EventHandle<T>) -> Vec<Notification<T>> {
        let mut out = Vec::new();
        loop {
            match handle.recv_timeout(Duration::from_secs(5)) {
                Ok(notification) => {
                    let terminal = notification.is_terminal();
                    out.push(notification);
                    if terminal {
                        return out;
                    }
                }
                Err(_) => return out,
            }
        }
    }

    #[test]
    fn test_merges_all_inner_values() {
        let stream = Observable::of(["a", "b", "c"])
            .flat_map(|item| Ok(Observable::of([format!("{item}!")])));
        let handle = stream.subscribe_channel(16);

        let events = drain(&handle);
        let mut values: Vec<String> = events
            .iter()
            .filter_map(|n| match n {
                Notification::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect();
        values.sort();

        assert_eq!(values, vec!["a!", "b!", "c!"]);
        assert_eq!(events.last(), Some(&Notification::Completed));
    }

    #[test]
    fn test_completes_only_after_slow_inner() {
        // Source completes immediately; one inner takes a while.
        let stream = Observable::of([10u64, 50]).flat_map(|delay| {
            Ok(Observable::create(move |emitter| {
                thread::sleep(Duration::from_millis(delay));
                emitter.next(delay);
                emitter.complete();
            }))
        });
        let handle = stream.subscribe_channel(16);

        let events = drain(&handle);
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&Notification::Completed));
    }

    #[test]
    fn test_worker_err_fails_merge() {
        let stream = Observable::of([1, 2]).flat_map(|n| {
            if n == 2 {
                Err(StreamError::Worker(format!("no worker for {n}")))
            } else {
                Ok(Observable::of([n]))
            }
        });
        let handle = stream.subscribe_channel(16);

        let events = drain(&handle);
        assert!(matches!(
            events.last(),
            Some(Notification::Error(StreamError::Worker(_)))
        ));
    }

    #[test]
    fn test_inner_error_cancels_siblings() {
        let slow_cancelled = Cancellation::new();
        let probe = slow_cancelled.clone();

        let stream = Observable::of(["fail", "slow"]).flat_map(move |item| {
            if item == "fail" {
                Ok(Observable::throw(StreamError::Stream("boom".into())))
            } else {
                let probe = probe.clone();
                Ok(Observable::create(move |emitter: Emitter<String>| {
                    // Mirror the merge's cancellation onto the probe.
                    for _ in 0..100 {
                        if emitter.is_closed() {
                            probe.cancel();
                            return;
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                    emitter.next("slow".to_string());
                    emitter.complete();
                }))
            }
        });
        let handle = stream.subscribe_channel(16);

        let events = drain(&handle);
        assert!(matches!(events.last(), Some(Notification::Error(_))));
        assert!(!events.contains(&Notification::Next("slow".to_string())));

        // The sibling's producer observes the teardown.
        for _ in 0..100 {
            if slow_cancelled.is_cancelled() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("sibling inner was not cancelled");
    }

    #[test]
    fn test_source_error_fails_merge() {
        let source = Observable::create(|emitter: Emitter<i32>| {
            emitter.next(1);
            emitter.error(StreamError::Stream("source broke".into()));
        });
        let stream = source.flat_map(|n| Ok(Observable::of([n])));
        let handle = stream.subscribe_channel(16);

        let events = drain(&handle);
        assert!(matches!(events.last(), Some(Notification::Error(_))));
        // Exactly one terminal.
        assert_eq!(events.iter().filter(|n| n.is_terminal()).count(), 1);
    }

    #[test]
    fn test_empty_source_completes() {
        let stream =
            Observable::<i32>::of([]).flat_map(|n: i32| Ok(Observable::of([n])));
        let handle = stream.subscribe_channel(4);
        assert_eq!(drain(&handle), vec![Notification::Completed]);
    }
}
