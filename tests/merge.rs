//! Merge semantics of the flat-mapping combinator.

use proptest::prelude::*;
use rivulet::{Emitter, EventHandle, Notification, Observable, StreamError};
use std::thread;
use std::time::Duration;

fn drain<T: Send + 'static>(handle: &EventHandle<T>) -> Vec<Notification<T>> {
    let mut out = Vec::new();
    loop {
        match handle.recv_timeout(Duration::from_secs(10)) {
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

fn next_values(events: &[Notification<String>]) -> Vec<String> {
    events
        .iter()
        .filter_map(|n| match n {
            Notification::Next(v) => Some(v.clone()),
            _ => None,
        })
        .collect()
}

// --- Terminal discipline ---

#[test]
fn test_exactly_one_terminal_and_nothing_after() {
    let stream = Observable::of(["a", "b", "c", "d"])
        .flat_map(|item| Ok(Observable::of([item.to_string()])));
    let handle = stream.subscribe_channel(32);

    let events = drain(&handle);
    let terminals = events.iter().filter(|n| n.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(events.last().unwrap().is_terminal());

    // The channel carries nothing past the terminal.
    thread::sleep(Duration::from_millis(30));
    assert!(handle.try_recv().is_err());
}

#[test]
fn test_fail_fast_emits_single_error_terminal() {
    // Three inners: one errors promptly, the others would take longer.
    let stream = Observable::of([0u64, 40, 80]).flat_map(|delay| {
        Ok(Observable::create(move |emitter: Emitter<String>| {
            if delay == 0 {
                emitter.error(StreamError::Stream("inner failed".into()));
            } else {
                thread::sleep(Duration::from_millis(delay));
                emitter.next(format!("slow {delay}"));
                emitter.complete();
            }
        }))
    });
    let handle = stream.subscribe_channel(32);

    let events = drain(&handle);
    assert!(matches!(
        events.last(),
        Some(Notification::Error(StreamError::Stream(_)))
    ));
    assert_eq!(events.iter().filter(|n| n.is_terminal()).count(), 1);

    // Siblings were cut off before delivering.
    thread::sleep(Duration::from_millis(150));
    assert!(handle.try_recv().is_err());
}

// --- Multi-item inners ---

#[test]
fn test_inner_streams_may_emit_many_values() {
    let stream = Observable::of([2usize, 3]).flat_map(|n| {
        let values: Vec<String> = (0..n).map(|i| format!("{n}:{i}")).collect();
        Ok(Observable::of(values))
    });
    let handle = stream.subscribe_channel(32);

    let events = drain(&handle);
    let mut values = next_values(&events);
    values.sort();
    assert_eq!(values, vec!["2:0", "2:1", "3:0", "3:1", "3:2"]);
    assert_eq!(events.last(), Some(&Notification::Completed));
}

// --- Merge soundness, property-tested ---

proptest! {
    /// For any finite command sequence and a deterministic single-value
    /// worker, the merged Next payloads are exactly the worker outputs,
    /// terminated by exactly one Completed.
    #[test]
    fn prop_merge_preserves_worker_outputs(items in proptest::collection::vec("[a-z]{1,8}", 0..12)) {
        let stream = Observable::of(items.clone())
            .flat_map(|item: String| Ok(Observable::of([format!("out:{item}")])));
        let handle = stream.subscribe_channel(64);

        let events = drain(&handle);

        let mut got = next_values(&events);
        got.sort();
        let mut want: Vec<String> = items.iter().map(|i| format!("out:{i}")).collect();
        want.sort();
        prop_assert_eq!(got, want);

        prop_assert_eq!(events.iter().filter(|n| n.is_terminal()).count(), 1);
        prop_assert_eq!(events.last(), Some(&Notification::Completed));
    }
}
