//! Core data types for treesync
//!
//! This module provides the difference status taxonomy, the two sides of a
//! comparison, the comparison policy flags and the statistics shared by the
//! copy and synchronization layers.

use crate::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Transfer rate in bytes per second
pub type TransferRate = f64;

/// One of the two compared locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    /// Location A
    A,
    /// Location B
    B,
}

impl Side {
    /// The opposite location
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Observed kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntryKind {
    /// Regular file (symlinks are followed)
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// Whether this is a directory
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// State of one node in the difference tree
///
/// Each actionable status names the mutation the synchronization engine
/// performs for it. `Clean`, `Conflict` and `FileVsFolderConflict` are never
/// applied; `Unknown` is the initial state and must never reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DiffStatus {
    /// Initial state
    #[default]
    Unknown,
    /// Entry at A will be copied to B
    CopyToB,
    /// Entry at B will be copied to A
    CopyToA,
    /// File at A will overwrite the older file at B
    ReplaceB,
    /// File at B will overwrite the older file at A
    ReplaceA,
    /// Entry at A will be removed
    RemoveFromA,
    /// Entry at B will be removed
    RemoveFromB,
    /// Both files have equal content but different modification times
    Touch,
    /// Directory with no differences below it
    Clean,
    /// Same modification time but different size or content
    Conflict,
    /// A file on one side and a directory on the other
    FileVsFolderConflict,
}

impl DiffStatus {
    /// Every status, in declaration order
    pub const ALL: [Self; 11] = [
        Self::Unknown,
        Self::CopyToB,
        Self::CopyToA,
        Self::ReplaceB,
        Self::ReplaceA,
        Self::RemoveFromA,
        Self::RemoveFromB,
        Self::Touch,
        Self::Clean,
        Self::Conflict,
        Self::FileVsFolderConflict,
    ];

    /// The opposite action
    ///
    /// The opposite of "copy A to B" is "remove from A", the opposite of
    /// "replace A" is "replace B". `Touch` and `Clean` map to themselves.
    ///
    /// Both conflict statuses map to `ReplaceB` as a directional default, so
    /// inversion is not an involution on them: inverting twice yields
    /// `ReplaceA`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] for `Unknown`.
    pub fn invert(self) -> Result<Self> {
        match self {
            Self::CopyToA => Ok(Self::RemoveFromB),
            Self::RemoveFromB => Ok(Self::CopyToA),
            Self::CopyToB => Ok(Self::RemoveFromA),
            Self::RemoveFromA => Ok(Self::CopyToB),
            Self::ReplaceA => Ok(Self::ReplaceB),
            Self::ReplaceB => Ok(Self::ReplaceA),
            Self::Touch => Ok(Self::Touch),
            Self::Clean => Ok(Self::Clean),
            Self::Conflict | Self::FileVsFolderConflict => Ok(Self::ReplaceB),
            Self::Unknown => Err(Error::inconsistent(format!(
                "cannot invert status {:?}",
                self
            ))),
        }
    }

    /// Whether a directory node may carry this status
    pub fn is_directory_legal(self) -> bool {
        matches!(
            self,
            Self::CopyToA
                | Self::CopyToB
                | Self::RemoveFromA
                | Self::RemoveFromB
                | Self::Clean
                | Self::FileVsFolderConflict
        )
    }

    /// Whether the synchronization engine performs a mutation for this status
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            Self::CopyToA
                | Self::CopyToB
                | Self::ReplaceA
                | Self::ReplaceB
                | Self::RemoveFromA
                | Self::RemoveFromB
                | Self::Touch
        )
    }

    /// Whether this status is one of the two conflicts
    pub fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict | Self::FileVsFolderConflict)
    }

    /// Side whose bytes are read when this status is applied
    pub fn source_side(self) -> Option<Side> {
        match self {
            Self::CopyToB | Self::ReplaceB => Some(Side::A),
            Self::CopyToA | Self::ReplaceA => Some(Side::B),
            _ => None,
        }
    }

    /// Side that is written or deleted when this status is applied
    pub fn target_side(self) -> Option<Side> {
        match self {
            Self::CopyToB | Self::ReplaceB | Self::RemoveFromB => Some(Side::B),
            Self::CopyToA | Self::ReplaceA | Self::RemoveFromA => Some(Side::A),
            _ => None,
        }
    }

    /// Side whose entry kind decides whether the node is a directory
    ///
    /// That is the side that will be read or kept. `Clean`, `Touch` and
    /// `Unknown` have no relevant side.
    pub fn relevant_side(self) -> Option<Side> {
        match self {
            Self::CopyToB
            | Self::ReplaceB
            | Self::RemoveFromA
            | Self::Conflict
            | Self::FileVsFolderConflict => Some(Side::A),
            Self::CopyToA | Self::ReplaceA | Self::RemoveFromB => Some(Side::B),
            Self::Clean | Self::Touch | Self::Unknown => None,
        }
    }

    /// Human readable description of the pending action
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "unknown state",
            Self::CopyToB => "copy from A to B",
            Self::CopyToA => "copy from B to A",
            Self::ReplaceB => "overwrite older file in B",
            Self::ReplaceA => "overwrite older file in A",
            Self::RemoveFromA => "remove from A",
            Self::RemoveFromB => "remove from B",
            Self::Touch => "equalize modification times",
            Self::Clean => "no differences",
            Self::Conflict => "conflict: same time, different content",
            Self::FileVsFolderConflict => "conflict: file versus folder",
        }
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Flags controlling how two files with the same name are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComparePolicy {
    /// Skip the content check and treat same-size files with differing
    /// timestamps as timestamp-only drift (`Touch`)
    pub assume_equal_if_same_size: bool,
    /// Verify content even when size and timestamp are equal
    pub always_verify_content: bool,
    /// Equalize timestamps while scanning instead of reporting `Touch` nodes
    pub implicit_timestamp_sync: bool,
}

impl ComparePolicy {
    /// Create the default policy (all flags off)
    pub fn new() -> Self {
        Self::default()
    }
}

/// File copy statistics
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CopyStats {
    /// Number of files copied
    pub files_copied: u64,
    /// Number of directories created
    pub directories_created: u64,
    /// Total bytes copied
    pub bytes_copied: u64,
    /// Total duration of the operation
    pub duration: Duration,
}

impl CopyStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the overall transfer rate
    pub fn transfer_rate(&self) -> TransferRate {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_copied as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &CopyStats) {
        self.files_copied += other.files_copied;
        self.directories_created += other.directories_created;
        self.bytes_copied += other.bytes_copied;
        self.duration += other.duration;
    }
}

/// Shared cancellation flag
///
/// Clones observe the same flag, so a UI thread can cancel a run that is
/// polling from a worker task.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the owner can start another run
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
