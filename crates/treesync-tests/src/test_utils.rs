//! Unified test utilities for treesync tests and benchmarks
//!
//! This module provides the fixtures shared by the integration tests and the
//! benchmarks: a pair of temporary locations, deterministic test data and
//! progress sinks with scripted cancellation.

use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use treesync_sync::RootContext;
use treesync_types::{CancelFlag, ProgressSink, Side};

/// A fixed, old modification time used by default
pub const BASE_MTIME: i64 = 1_600_000_000;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Deterministic pseudo-random bytes
    Random,
    /// Repeating structure similar to real files
    Realistic,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Random => {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let mut data = Vec::with_capacity(size);
            let mut hasher = DefaultHasher::new();
            for i in 0..size {
                i.hash(&mut hasher);
                data.push((hasher.finish() % 256) as u8);
            }
            data
        }
        TestDataPattern::Realistic => (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect(),
    }
}

/// Two temporary directories validated as location A and location B
pub struct LocationPair {
    _dir_a: TempDir,
    _dir_b: TempDir,
    roots: RootContext,
}

impl LocationPair {
    /// Create two empty locations
    pub fn new() -> Self {
        let dir_a = TempDir::new().expect("Failed to create location A");
        let dir_b = TempDir::new().expect("Failed to create location B");
        let roots =
            RootContext::initialize(dir_a.path(), dir_b.path()).expect("Invalid location pair");
        Self {
            _dir_a: dir_a,
            _dir_b: dir_b,
            roots,
        }
    }

    /// The validated roots
    pub fn roots(&self) -> &RootContext {
        &self.roots
    }

    /// Absolute path of `relative` under `side`
    pub fn path(&self, side: Side, relative: &str) -> PathBuf {
        self.roots.absolute(side, Path::new(relative))
    }

    /// Write a file, creating parent directories, and set its modification time
    pub fn write_file(&self, side: Side, relative: &str, content: &[u8], mtime: i64) -> PathBuf {
        let path = self.path(side, relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write test file");
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0))
            .expect("Failed to set modification time");
        path
    }

    /// Write the same file to both locations with the same modification time
    pub fn write_both(&self, relative: &str, content: &[u8], mtime: i64) {
        self.write_file(Side::A, relative, content, mtime);
        self.write_file(Side::B, relative, content, mtime);
    }

    /// Create a directory (and its parents)
    pub fn create_dir(&self, side: Side, relative: &str) -> PathBuf {
        let path = self.path(side, relative);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// Content of a file
    pub fn read(&self, side: Side, relative: &str) -> Vec<u8> {
        fs::read(self.path(side, relative)).expect("Failed to read test file")
    }

    /// Modification time of an entry
    pub fn modified(&self, side: Side, relative: &str) -> FileTime {
        let metadata = fs::metadata(self.path(side, relative)).expect("Failed to stat entry");
        FileTime::from_last_modification_time(&metadata)
    }

    /// Whether an entry exists
    pub fn exists(&self, side: Side, relative: &str) -> bool {
        self.path(side, relative).exists()
    }

    /// Fill `side` with `dirs` directories holding `files_per_dir` files each
    pub fn populate(&self, side: Side, dirs: usize, files_per_dir: usize, file_size: usize) {
        let data = generate_test_data(file_size, TestDataPattern::Realistic);
        for dir in 0..dirs {
            for file in 0..files_per_dir {
                self.write_file(
                    side,
                    &format!("dir{dir:03}/file{file:03}.bin"),
                    &data,
                    BASE_MTIME,
                );
            }
        }
    }
}

impl Default for LocationPair {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress sink that asks to cancel once enough units were reported
#[derive(Debug)]
pub struct CancelAfter {
    threshold: u64,
    worked: AtomicU64,
    cancel: CancelFlag,
}

impl CancelAfter {
    /// Cancel as soon as at least `threshold` units were reported
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            worked: AtomicU64::new(0),
            cancel: CancelFlag::new(),
        }
    }

    /// Units reported so far
    pub fn worked_units(&self) -> u64 {
        self.worked.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CancelAfter {
    fn begin(&self, _name: &str, _total: u64) {
        self.worked.store(0, Ordering::Relaxed);
    }

    fn sub_task(&self, _name: &str) {}

    fn worked(&self, units: u64) {
        let worked = self.worked.fetch_add(units, Ordering::Relaxed) + units;
        if worked >= self.threshold {
            self.cancel.cancel();
        }
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn done(&self) {}
}
