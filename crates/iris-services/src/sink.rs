//! Output sink — user-visible event lines.
//!
//! The lifecycle handler reports what happens to peers as `(level, text)`
//! pairs. Whatever renders them must never hold up event processing, so
//! the stock sink is an unbounded channel drained by a separate task.

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}

/// One line for the operator, rendered as `LEVEL: text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub level: Level,
    pub text: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.text)
    }
}

pub trait OutputSink: Send + Sync {
    /// Must return without waiting on the consumer.
    fn emit(&self, level: Level, text: String);
}

#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn emit(&self, level: Level, text: String) {
        if self.tx.send(OutputLine { level, text }).is_err() {
            tracing::trace!("output sink receiver dropped");
        }
    }
}
