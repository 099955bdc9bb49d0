//! Progress reporting for comparison and synchronization runs
//!
//! Runs count their work in natural units (files while comparing, bytes while
//! synchronizing) and [`WorkMeter`] maps that count onto a fixed range of
//! [`WORK_MAX`] sink units. Cancellation is polled on every step.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};
use treesync_io::ChunkObserver;
use treesync_types::{CancelFlag, Error, ProgressSink, Result};

/// Units reported to a [`ProgressSink`] for a complete run
pub const WORK_MAX: u64 = 1000;

/// Maps a run's natural work count onto [`WORK_MAX`] sink units
pub struct WorkMeter<'a> {
    sink: &'a dyn ProgressSink,
    total: u64,
    processed: u64,
    reported: u64,
}

impl<'a> WorkMeter<'a> {
    /// Start metering `total` units of natural work
    pub fn new(sink: &'a dyn ProgressSink, total: u64) -> Self {
        Self {
            sink,
            total,
            processed: 0,
            reported: 0,
        }
    }

    /// Record `amount` more units of natural work
    ///
    /// The processed count is clamped to the total and a sink update is only
    /// issued when the scaled value moves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the sink asks to cancel.
    pub fn advance(&mut self, amount: u64) -> Result<()> {
        if self.sink.is_canceled() {
            return Err(Error::Cancelled);
        }

        self.processed = self.processed.saturating_add(amount).min(self.total);
        let target = self.scaled();
        if target > self.reported {
            self.sink.worked(target - self.reported);
            self.reported = target;
        }
        Ok(())
    }

    /// Poll for cancellation without recording work
    pub fn check_cancelled(&self) -> Result<()> {
        if self.sink.is_canceled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Natural units processed so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Sink units reported so far
    pub fn reported(&self) -> u64 {
        self.reported
    }

    /// The sink being driven
    pub fn sink(&self) -> &'a dyn ProgressSink {
        self.sink
    }

    fn scaled(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let scaled = u128::from(self.processed) * u128::from(WORK_MAX) / u128::from(self.total);
        scaled as u64
    }
}

impl std::fmt::Debug for WorkMeter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkMeter")
            .field("total", &self.total)
            .field("processed", &self.processed)
            .field("reported", &self.reported)
            .finish_non_exhaustive()
    }
}

impl ChunkObserver for WorkMeter<'_> {
    fn chunk_copied(&mut self, bytes: u64) -> Result<()> {
        self.advance(bytes)
    }
}

/// Sink that discards progress but still honours a cancel flag
#[derive(Debug, Clone, Default)]
pub struct NullProgress {
    cancel: CancelFlag,
}

impl NullProgress {
    /// Create a sink that never cancels on its own
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink observing an existing cancel flag
    pub fn with_cancel_flag(cancel: CancelFlag) -> Self {
        Self { cancel }
    }

    /// Flag that cancels runs driven by this sink
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

impl ProgressSink for NullProgress {
    fn begin(&self, _name: &str, _total: u64) {}

    fn sub_task(&self, _name: &str) {}

    fn worked(&self, _units: u64) {}

    fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn done(&self) {}
}

/// Sink that logs progress through `tracing` and keeps the running totals
#[derive(Debug, Default)]
pub struct TracingProgress {
    task: Mutex<String>,
    total: AtomicU64,
    worked: AtomicU64,
    finished: AtomicBool,
    cancel: CancelFlag,
}

impl TracingProgress {
    /// Create a sink with its own cancel flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink observing an existing cancel flag
    pub fn with_cancel_flag(cancel: CancelFlag) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    /// Flag that cancels runs driven by this sink
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Units announced by the last `begin`
    pub fn total_units(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Units reported since the last `begin`
    pub fn worked_units(&self) -> u64 {
        self.worked.load(Ordering::Relaxed)
    }

    /// Whether the last run called `done`
    pub fn is_done(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Name of the current task or sub-task
    pub fn current_task(&self) -> String {
        self.task
            .lock()
            .map(|task| task.clone())
            .unwrap_or_default()
    }

    fn set_task(&self, name: &str) {
        if let Ok(mut task) = self.task.lock() {
            name.clone_into(&mut *task);
        }
    }
}

impl ProgressSink for TracingProgress {
    fn begin(&self, name: &str, total: u64) {
        info!("{} ({} units)", name, total);
        self.set_task(name);
        self.total.store(total, Ordering::Relaxed);
        self.worked.store(0, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
    }

    fn sub_task(&self, name: &str) {
        debug!("{}", name);
        self.set_task(name);
    }

    fn worked(&self, units: u64) {
        let worked = self.worked.fetch_add(units, Ordering::Relaxed) + units;
        debug!(
            "Progress: {}/{} units",
            worked,
            self.total.load(Ordering::Relaxed)
        );
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn done(&self) {
        self.finished.store(true, Ordering::Relaxed);
        debug!("Finished '{}'", self.current_task());
    }
}
