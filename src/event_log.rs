//! Append-only, timestamped trace of dispatch, poll and refresh events.

use crate::model::LogEvent;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub message: String,
}

impl LogEntry {
    /// `HH:MM:SS message`, the way the monitor prints it.
    pub fn display_line(&self) -> String {
        let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
        let ts = self
            .timestamp
            .format(&fmt)
            .unwrap_or_else(|_| "--:--:--".into());
        format!("{ts} {}", self.message)
    }
}

#[derive(Default)]
struct Inner {
    entries: Vec<LogEntry>,
    subscribers: Vec<mpsc::UnboundedSender<LogEntry>>,
}

/// Cloneable handle to one session's log. All clones share the same entries.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Inner>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave entries half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message. The timestamp is taken under the lock so entries stay
    /// in append order.
    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let mut inner = self.lock();
        let entry = LogEntry {
            timestamp: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            message: message.into(),
        };
        tracing::debug!(message = %entry.message, "event log");
        inner.entries.push(entry.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(entry.clone()).is_ok());
        entry
    }

    pub fn record(&self, event: &LogEvent) -> LogEntry {
        self.append(event.to_message())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone()
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LogEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}
