//! Append-only ring buffer of structured log entries with subscriber notification

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Number of entries kept before the oldest ones are dropped
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Severity of a log entry
///
/// `System` marks events produced by the console machinery itself
/// (for example a directive extracted from an agent reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    System,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::System => "SYSTEM",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry ID (UUID v7, so IDs sort by creation time)
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that produced the entry (e.g. "GEMINI", "PARSER", "CHAT")
    pub source: String,
}

impl fmt::Display for LogEntry {
    /// Renders the entry the way the system log panel shows it:
    /// `[14:02:11] ERROR  GEMINI   API key missing`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<6} {:<8} {}",
            self.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            self.level,
            self.source,
            self.message
        )
    }
}

type Listener = Arc<dyn Fn(&LogEntry) + Send + Sync>;

struct Inner {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl Inner {
    fn remove_listener(&self, id: u64) {
        lock(&self.listeners).retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Shared handle to the system log
///
/// Cloning is cheap: all clones append to the same buffer and notify the
/// same subscribers.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl LogSink {
    /// Create a sink holding up to [`DEFAULT_LOG_CAPACITY`] entries
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create a sink holding up to `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                capacity,
                entries: Mutex::new(VecDeque::with_capacity(capacity)),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Record an entry, evict the oldest one if the buffer is full, and
    /// notify every subscriber.
    ///
    /// The entry is also emitted as a `tracing` event so it reaches the
    /// process log output.
    pub fn log(&self, message: impl Into<String>, level: LogLevel, source: &str) {
        let entry = LogEntry {
            id: uuid::Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            source: source.to_string(),
        };

        match level {
            LogLevel::Info => tracing::info!(source, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(source, "{}", entry.message),
            LogLevel::Error => tracing::error!(source, "{}", entry.message),
            LogLevel::System => tracing::debug!(source, "{}", entry.message),
        }

        {
            let mut entries = lock(&self.inner.entries);
            entries.push_back(entry.clone());
            while entries.len() > self.inner.capacity {
                entries.pop_front();
            }
        }

        // Snapshot the listeners so a callback may subscribe/unsubscribe
        // without deadlocking.
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&entry);
        }
    }

    /// Register a listener called with every new entry
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            sink: Arc::downgrade(&self.inner),
        }
    }

    /// All retained entries, most recent last
    pub fn history(&self) -> Vec<LogEntry> {
        lock(&self.inner.entries).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Guard returned by [`LogSink::subscribe`]
pub struct Subscription {
    id: u64,
    sink: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving entries
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.sink.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

/// Lock a mutex, recovering the data if a listener panicked while it was held
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
