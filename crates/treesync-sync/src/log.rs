//! User-facing activity log
//!
//! Lifecycle events (scan start and end, copies, deletions, touches,
//! failures) are recorded both through `tracing` and into a [`LogSink`], which
//! the host application typically shows in a log view.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use treesync_types::LogSink;

/// Record `message` in `sink` stamped with the current local time
pub fn log_event(sink: &dyn LogSink, message: &str) {
    info!("{}", message);
    sink.record(Local::now(), message);
}

/// One recorded line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the line was recorded
    pub timestamp: DateTime<Local>,
    /// The line itself
    pub message: String,
}

/// Change notification delivered to [`ActivityLog`] listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A line was recorded
    Entry(LogEntry),
    /// The history was cleared
    Cleared,
    /// Listener notification was switched on or off
    EnabledChanged(bool),
}

type Listener = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Lines kept by [`ActivityLog::new`]
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

struct LogState {
    enabled: bool,
    capacity: usize,
    entries: VecDeque<LogEntry>,
    listeners: Vec<Listener>,
}

/// Thread-safe in-memory [`LogSink`]
///
/// Lines are always kept, up to a capacity after which the oldest are
/// dropped; listeners only hear about them while the log is enabled. Toggling
/// the enabled state clears the history.
pub struct ActivityLog {
    state: Mutex<LogState>,
}

impl ActivityLog {
    /// Create an empty, enabled log keeping [`DEFAULT_LOG_CAPACITY`] lines
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create an empty, enabled log keeping at most `capacity` lines
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                enabled: true,
                capacity: capacity.max(1),
                entries: VecDeque::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// Maximum number of kept lines
    pub fn capacity(&self) -> usize {
        self.state().capacity
    }

    /// Snapshot of all recorded lines, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.state().entries.iter().cloned().collect()
    }

    /// Recorded messages without timestamps, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.state()
            .entries
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Number of recorded lines
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether listeners are notified
    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// Switch listener notification on or off; the history is cleared either way
    pub fn set_enabled(&self, enabled: bool) {
        let listeners = {
            let mut state = self.state();
            state.enabled = enabled;
            state.entries.clear();
            state.listeners.clone()
        };
        notify(&listeners, &LogEvent::EnabledChanged(enabled));
        notify(&listeners, &LogEvent::Cleared);
    }

    /// Drop the history
    pub fn clear(&self) {
        let listeners = {
            let mut state = self.state();
            state.entries.clear();
            state.listeners.clone()
        };
        notify(&listeners, &LogEvent::Cleared);
    }

    /// Register a change listener
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        self.state().listeners.push(Arc::new(listener));
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        // Listeners run outside the lock; a poisoned state is still consistent
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ActivityLog")
            .field("enabled", &state.enabled)
            .field("entries", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl LogSink for ActivityLog {
    fn record(&self, timestamp: DateTime<Local>, message: &str) {
        let entry = LogEntry {
            timestamp,
            message: message.to_string(),
        };
        let listeners = {
            let mut state = self.state();
            if state.entries.len() >= state.capacity {
                state.entries.pop_front();
            }
            state.entries.push_back(entry.clone());
            if state.enabled {
                state.listeners.clone()
            } else {
                Vec::new()
            }
        };
        notify(&listeners, &LogEvent::Entry(entry));
    }
}

fn notify(listeners: &[Listener], event: &LogEvent) {
    for listener in listeners {
        listener(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting(log: &ActivityLog) -> Arc<Mutex<Vec<LogEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        log.add_listener(move |event| sink.lock().unwrap().push(event.clone()));
        seen
    }

    #[test]
    fn test_log_event_records_message() {
        let log = ActivityLog::new();
        log_event(&log, "Starting synchronization process.");
        log_event(&log, "Finished synchronization process.");

        assert_eq!(
            log.messages(),
            vec![
                "Starting synchronization process.".to_string(),
                "Finished synchronization process.".to_string()
            ]
        );
        let entries = log.entries();
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_listeners_hear_entries_while_enabled() {
        let log = ActivityLog::new();
        let seen = collecting(&log);

        log_event(&log, "one");
        log.set_enabled(false);
        log_event(&log, "two");

        let seen = seen.lock().unwrap();
        assert!(matches!(&seen[0], LogEvent::Entry(entry) if entry.message == "one"));
        assert_eq!(seen[1], LogEvent::EnabledChanged(false));
        assert_eq!(seen[2], LogEvent::Cleared);
        assert_eq!(seen.len(), 3);
        assert_eq!(log.messages(), vec!["two".to_string()]);
    }

    #[test]
    fn test_oldest_lines_are_dropped_at_capacity() {
        let log = ActivityLog::with_capacity(3);
        for line in ["one", "two", "three", "four", "five"] {
            log_event(&log, line);
        }

        assert_eq!(log.capacity(), 3);
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.messages(),
            vec!["three".to_string(), "four".to_string(), "five".to_string()]
        );
    }

    #[test]
    fn test_clear() {
        let log = ActivityLog::new();
        let seen = collecting(&log);
        log_event(&log, "line");
        log.clear();

        assert!(log.is_empty());
        assert_eq!(seen.lock().unwrap().last(), Some(&LogEvent::Cleared));
    }

    #[test]
    fn test_listener_may_read_the_log() {
        let log = Arc::new(ActivityLog::new());
        let reader = Arc::clone(&log);
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        log.add_listener(move |_| sink.lock().unwrap().push(reader.len()));

        log_event(log.as_ref(), "first");
        assert_eq!(*lengths.lock().unwrap(), vec![1]);
    }
}
