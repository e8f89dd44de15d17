//! Log entries and the workflow log broadcaster
//!
//! A workflow run reports progress as a sequence of [`LogEntry`] values. The
//! caller owns a [`LogBroadcaster`] and hands it to the run; any number of
//! listeners can subscribe to it (and later unsubscribe) while the run is live.
//!
//! Two delivery styles are supported:
//! - Callback listeners via [`LogBroadcaster::subscribe`], invoked synchronously
//!   on the publishing task.
//! - A tokio broadcast channel via [`LogBroadcaster::channel`], used by SSE
//!   streams. Slow receivers lose the oldest entries once the buffer fills.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Severity of a workflow log entry
///
/// Serialized as the lowercase `type` field of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Wire name, also used as the SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress message from a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create a log entry stamped with the current time
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }
}

/// Handle returned by [`LogBroadcaster::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Observer for workflow log entries
///
/// # Examples
///
/// ```
/// use vproj_common::events::{LogBroadcaster, LogEntry, LogLevel};
/// use std::sync::{Arc, Mutex};
///
/// let broadcaster = LogBroadcaster::new(100);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let id = broadcaster.subscribe(move |entry| sink.lock().unwrap().push(entry.message.clone()));
///
/// broadcaster.publish(LogEntry::new("hello", LogLevel::Info));
/// assert!(broadcaster.unsubscribe(id));
/// broadcaster.publish(LogEntry::new("ignored", LogLevel::Info));
///
/// assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
/// ```
pub struct LogBroadcaster {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    /// Creates a broadcaster whose channel buffers `capacity` entries per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    /// Register a callback listener
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        tracing::debug!(listener = id.0, "Log listener subscribed");
        id
    }

    /// Remove a callback listener
    ///
    /// Returns `false` if the id was never registered or already removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(listener = id.0, "Log listener unsubscribed");
        }
        removed
    }

    /// Receiver for all entries published after this call
    pub fn channel(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    /// Deliver an entry to every listener and channel receiver
    pub fn publish(&self, entry: LogEntry) {
        // Snapshot so a listener may unsubscribe from inside its callback
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(&entry);
        }

        // No receivers is fine
        let _ = self.tx.send(entry);
    }

    /// Number of callback listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for LogBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBroadcaster")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}
