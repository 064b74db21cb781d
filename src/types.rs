//! Core types for the stream pipeline.

use crate::error::StreamError;
use std::fmt;

/// One event in a stream.
///
/// A well-formed stream delivers zero or more `Next`, then at most one
/// terminal (`Error` or `Completed`, never both), and nothing after the
/// terminal.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<T> {
    /// A produced item.
    Next(T),

    /// Terminal failure. Nothing follows.
    Error(StreamError),

    /// Terminal success. Nothing follows.
    Completed,
}

impl<T> Notification<T> {
    /// True for `Error` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// True for `Next`.
    pub fn is_next(&self) -> bool {
        matches!(self, Notification::Next(_))
    }

    /// Total dispatch over the three variants.
    ///
    /// Exactly one handler is called, with the variant's payload, and its
    /// result is returned.
    pub fn reduce<R>(
        self,
        on_next: impl FnOnce(T) -> R,
        on_error: impl FnOnce(StreamError) -> R,
        on_completed: impl FnOnce() -> R,
    ) -> R {
        match self {
            Notification::Next(value) => on_next(value),
            Notification::Error(err) => on_error(err),
            Notification::Completed => on_completed(),
        }
    }
}

/// Per-subscription ordinal of an inner stream, assigned in source order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ordinal(pub u64);

impl Ordinal {
    pub fn next(self) -> Self {
        Ordinal(self.0 + 1)
    }
}

impl fmt::Debug for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ordinal({})", self.0)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
