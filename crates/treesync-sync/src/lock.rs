//! Single-flight run lock
//!
//! Only one comparison or synchronization may run at a time. A request that
//! finds the lock held is rejected, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};
use treesync_types::{Error, Result};

/// Advisory lock serializing comparison and synchronization runs
#[derive(Debug, Default)]
pub struct RunLock {
    held: AtomicBool,
}

impl RunLock {
    /// Create a released lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock; `false` when another run already holds it
    pub fn acquire(&self) -> bool {
        let acquired = self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        debug!("Run lock acquire: {}", if acquired { "granted" } else { "busy" });
        acquired
    }

    /// Give the lock back
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockMisuse`] when the lock is not held.
    pub fn release(&self) -> Result<()> {
        self.held
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                Error::lock_misuse("cannot release the run lock because it is not held")
            })
    }

    /// Whether some run currently holds the lock
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Take the lock and release it when the guard drops
    pub fn try_guard(&self) -> Option<RunGuard<'_>> {
        self.acquire().then_some(RunGuard { lock: self })
    }

    /// Like [`RunLock::try_guard`], for guards that move into a spawned task
    pub fn try_guard_owned(self: &Arc<Self>) -> Option<OwnedRunGuard> {
        self.acquire().then(|| OwnedRunGuard {
            lock: Arc::clone(self),
        })
    }
}

/// Holds a [`RunLock`] until dropped
#[derive(Debug)]
#[must_use = "the run lock is released as soon as the guard is dropped"]
pub struct RunGuard<'a> {
    lock: &'a RunLock,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            error!("Run guard dropped without holding the lock: {}", e);
        }
    }
}

/// Holds a shared [`RunLock`] until dropped
#[derive(Debug)]
#[must_use = "the run lock is released as soon as the guard is dropped"]
pub struct OwnedRunGuard {
    lock: Arc<RunLock>,
}

impl Drop for OwnedRunGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            error!("Run guard dropped without holding the lock: {}", e);
        }
    }
}
