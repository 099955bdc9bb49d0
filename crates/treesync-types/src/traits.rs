//! Core traits for treesync operations
//!
//! This module defines the seams between the synchronization core and its
//! external collaborators: progress display, activity log and name filtering.

use chrono::{DateTime, Local};

/// Trait for receiving progress of a comparison or synchronization run
///
/// Implementations are driven from a single worker task but may be observed
/// from another thread, hence the `&self` receivers.
pub trait ProgressSink: Send + Sync {
    /// A new run named `name` starts with `total` units of work
    fn begin(&self, name: &str, total: u64);

    /// The run moved on to a new sub-task
    fn sub_task(&self, name: &str);

    /// `units` more units of work are done
    fn worked(&self, units: u64);

    /// Whether the user asked to cancel the run
    fn is_canceled(&self) -> bool;

    /// The run finished
    fn done(&self);
}

/// Trait for receiving timestamped activity lines
pub trait LogSink: Send + Sync {
    /// Record one line of activity
    fn record(&self, timestamp: DateTime<Local>, message: &str);
}

/// Trait for deciding which names are excluded from comparison
pub trait NameFilter: Send + Sync {
    /// Whether the entry with the given file name is ignored
    fn is_ignored(&self, name: &str) -> bool;
}

impl<F> NameFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_ignored(&self, name: &str) -> bool {
        self(name)
    }
}
