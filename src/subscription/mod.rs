//! Subscription lifecycle: cancellation handles, the serialized delivery
//! gate, and a channel-backed consumer handle.
//!
//! Every `subscribe` returns a [`Cancellation`]. Cancelling it is
//! idempotent and propagates top-down: the subscription's producer stops,
//! and any child subscriptions it spawned are cancelled with it. Once
//! `cancel` returns, no further notifications are delivered for that
//! subscription tree.
//!
//! Delivery to a single observer is serialized by an [`Emitter`]: each
//! notification is delivered atomically, the first terminal wins, and
//! nothing is delivered after a terminal.

mod cancel;
mod emitter;
mod handle;

pub use cancel::Cancellation;
pub use emitter::Emitter;
pub use handle::EventHandle;
