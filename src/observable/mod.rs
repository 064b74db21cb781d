//! Lazy, push-based observables.
//!
//! An [`Observable`] is a description of how to produce a stream, not a
//! stream itself: it owns no per-subscription state, and every call to
//! `subscribe` starts an independent execution on its own thread.
//!
//! Combinators:
//! - [`Observable::flat_map`]: fan each source item out through a worker
//!   into an inner stream and merge all inner emissions (fail-fast).
//! - [`Observable::timeout`]: bound the wait for the first notification.
//!
//! # Example
//!
//! ```ignore
//! use rivulet::{observer, Observable};
//!
//! let stream = Observable::of(["a", "b"]).flat_map(|item| {
//!     Ok(Observable::of([item]))
//! });
//!
//! let handle = stream.subscribe_channel(64);
//! while let Ok(notification) = handle.recv() {
//!     let terminal = notification.is_terminal();
//!     println!("{notification:?}");
//!     if terminal {
//!         break;
//!     }
//! }
//! ```

mod flat_map;
mod source;
mod timeout;

pub use source::{observer, FnObserver, Observable, Observer};
