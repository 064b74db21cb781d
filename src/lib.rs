//! # Rivulet
//!
//! A minimal push-based reactive stream core: lazy observables, a merging
//! `flat_map` combinator, and a cancellation lifecycle over a closed
//! three-variant notification algebra.
//!
//! ## Core Concepts
//!
//! - **Notification**: one stream event — `Next(value)`, `Error(cause)`,
//!   or `Completed`; at most one terminal per stream, nothing after it
//! - **Observable**: a lazy description of how to produce a stream; each
//!   `subscribe` is an independent execution
//! - **FlatMap**: maps each source item to an inner stream and merges all
//!   inner emissions, failing fast on the first error anywhere
//! - **Cancellation**: caller-held handle tearing down a subscription and
//!   everything it spawned, idempotently
//!
//! ## Example
//!
//! ```ignore
//! use rivulet::{Observable, Pipeline};
//!
//! let pipeline = Pipeline::new(
//!     vec!["echo before".into(), "echo after".into()],
//!     |cmd| Ok(Observable::of([cmd])),
//! );
//!
//! let clean = pipeline.run(|line| println!("{line}"));
//! std::process::exit(if clean { 0 } else { 1 });
//! ```

pub mod error;
pub mod observable;
pub mod pipeline;
pub mod subscription;
pub mod types;

// Re-exports
pub use error::{Result, StreamError};
pub use observable::{observer, FnObserver, Observable, Observer};
pub use pipeline::{process_commands, render, Pipeline, ERROR_MESSAGE, SHUTDOWN_MESSAGE};
pub use subscription::{Cancellation, Emitter, EventHandle};
pub use types::{Notification, Ordinal};
