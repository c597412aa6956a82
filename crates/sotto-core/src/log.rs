//! Client-visible message log surfaced through `getMessageLogs`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the engine's client-visible log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Free-form message text.
    pub text: String,
}

/// Shared, append-only log retained for the life of the process.
///
/// Any component may append without coordination. The engine's `reset()`
/// deliberately leaves the log intact so clients can inspect what led up
/// to the reset.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Arc<Mutex<Vec<MessageLogEntry>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line stamped with the current time.
    pub fn append(&self, text: impl Into<String>) {
        let entry = MessageLogEntry {
            timestamp: Utc::now(),
            text: text.into(),
        };
        tracing::trace!(text = %entry.text, "Message logged");
        self.entries
            .lock()
            .expect("message log mutex poisoned")
            .push(entry);
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<MessageLogEntry> {
        self.entries
            .lock()
            .expect("message log mutex poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("message log mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
