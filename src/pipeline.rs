//! Command pipeline: composition, terminal mapping, and the entry point.
//!
//! The core knows nothing about command semantics. A caller supplies the
//! ordered command sequence, a worker that turns each command into a
//! result stream, and a sink for the rendered output lines; the pipeline
//! merges the result streams and maps the terminal event to a fixed
//! user-facing message.

use crate::error::Result;
use crate::observable::Observable;
use crate::types::Notification;
use tracing::debug;

/// Advisory shown when the pipeline terminates with an error.
pub const ERROR_MESSAGE: &str = "Your command could not be processed. Please try again.";

/// Shown when the command stream drains completely.
pub const SHUTDOWN_MESSAGE: &str = "No more commands to process. Shutting down!";

/// Default notification buffer between the pipeline and its consumer.
const DEFAULT_BUFFER: usize = 1000;

/// Reduce one notification to its user-facing line.
///
/// `Next` passes its value through verbatim; the terminals map to the
/// fixed messages, never the raw cause.
pub fn render(notification: Notification<String>) -> String {
    notification.reduce(
        |value| value,
        |_err| ERROR_MESSAGE.to_string(),
        || SHUTDOWN_MESSAGE.to_string(),
    )
}

/// Fan a command sequence out through `worker` and merge the results.
pub fn process_commands<F>(commands: Vec<String>, worker: F) -> Observable<String>
where
    F: Fn(String) -> Result<Observable<String>> + Send + Sync + 'static,
{
    Observable::of(commands).flat_map(worker)
}

/// One run of the command pipeline.
///
/// Owns its subscription for the duration of [`Pipeline::run`] and
/// releases it on every exit path.
pub struct Pipeline {
    stream: Observable<String>,
    buffer: usize,
}

impl Pipeline {
    /// Build a pipeline over a command sequence and a per-command worker.
    pub fn new<F>(commands: Vec<String>, worker: F) -> Self
    where
        F: Fn(String) -> Result<Observable<String>> + Send + Sync + 'static,
    {
        Self {
            stream: process_commands(commands, worker),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Override the consumer-side notification buffer.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Subscribe, feed every rendered line to `sink`, and block until the
    /// terminal event.
    ///
    /// Returns true if the stream completed cleanly; a wrapping CLI maps
    /// that to its exit code. The subscription is torn down before
    /// returning, whichever path exits.
    pub fn run(&self, mut sink: impl FnMut(&str)) -> bool {
        let handle = self.stream.subscribe_channel(self.buffer);
        debug!("pipeline subscribed");

        loop {
            match handle.recv() {
                Ok(notification) => {
                    let terminal = notification.is_terminal();
                    let clean = !matches!(notification, Notification::Error(_));
                    sink(&render(notification));
                    if terminal {
                        debug!(clean, "pipeline terminated");
                        return clean;
                    }
                }
                // Producer side wound down without a terminal; only
                // possible through cancellation.
                Err(_) => return false,
            }
        }
    }
}
