//! Classification of a file present under both locations

use filetime::FileTime;
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;
use treesync_io::FileCopier;
use treesync_types::{ComparePolicy, DiffStatus, Result};

/// Size and modification time of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Length in bytes
    pub size: u64,
    /// Last modification time
    pub modified: FileTime,
}

impl FileStat {
    /// Create a stat from raw values
    pub fn new(size: u64, modified: FileTime) -> Self {
        Self { size, modified }
    }

    /// Read the stat of `path`
    pub async fn read(path: &Path) -> Result<Self> {
        let metadata = FileCopier::entry_metadata(path).await?;
        Ok(Self {
            size: metadata.len(),
            modified: FileTime::from_last_modification_time(&metadata),
        })
    }
}

/// Outcome of the stat-level comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The status is known without reading any content
    Decided(DiffStatus),
    /// The contents must be compared to pick one of two statuses
    NeedsContent {
        /// Status when the contents are identical
        equal: DiffStatus,
        /// Status when the contents differ
        differ: DiffStatus,
    },
}

/// Decides the status of a pair of files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator {
    policy: ComparePolicy,
    copier: FileCopier,
}

impl FileComparator {
    /// Create a comparator applying `policy`
    pub fn new(policy: ComparePolicy, copier: FileCopier) -> Self {
        Self { policy, copier }
    }

    /// The policy in effect
    pub fn policy(&self) -> ComparePolicy {
        self.policy
    }

    /// Stat-level decision
    ///
    /// With `assume_equal_if_same_size`, same-size files whose timestamps
    /// differ are treated as timestamp-only drift and never read. Otherwise a
    /// timestamp difference is settled by a content check, and equal
    /// timestamps are `Clean` unless the sizes differ or the policy asks for
    /// a content check anyway.
    pub fn decide(a: &FileStat, b: &FileStat, policy: &ComparePolicy) -> Verdict {
        if a.size == b.size && a.modified != b.modified && policy.assume_equal_if_same_size {
            return Verdict::Decided(DiffStatus::Touch);
        }

        match a.modified.cmp(&b.modified) {
            Ordering::Less => Verdict::NeedsContent {
                equal: DiffStatus::Touch,
                differ: DiffStatus::ReplaceA,
            },
            Ordering::Greater => Verdict::NeedsContent {
                equal: DiffStatus::Touch,
                differ: DiffStatus::ReplaceB,
            },
            Ordering::Equal if a.size != b.size => Verdict::Decided(DiffStatus::Conflict),
            Ordering::Equal if policy.always_verify_content => Verdict::NeedsContent {
                equal: DiffStatus::Clean,
                differ: DiffStatus::Conflict,
            },
            Ordering::Equal => Verdict::Decided(DiffStatus::Clean),
        }
    }

    /// Classify the file pair, reading contents when the stats are not enough
    pub async fn compare(&self, path_a: &Path, path_b: &Path) -> Result<DiffStatus> {
        let stat_a = FileStat::read(path_a).await?;
        let stat_b = FileStat::read(path_b).await?;

        match Self::decide(&stat_a, &stat_b, &self.policy) {
            Verdict::Decided(status) => Ok(status),
            Verdict::NeedsContent { equal, differ } => {
                debug!(
                    "Comparing content of '{}' and '{}'",
                    path_a.display(),
                    path_b.display()
                );
                let same = stat_a.size == stat_b.size
                    && self.copier.content_equals(path_a, path_b).await?;
                Ok(if same { equal } else { differ })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use treesync_types::Error;

    const OLD: i64 = 1_600_000_000;
    const NEW: i64 = 1_700_000_000;

    fn stat(size: u64, seconds: i64) -> FileStat {
        FileStat::new(size, FileTime::from_unix_time(seconds, 0))
    }

    fn policy(assume_equal: bool, verify: bool) -> ComparePolicy {
        ComparePolicy {
            assume_equal_if_same_size: assume_equal,
            always_verify_content: verify,
            implicit_timestamp_sync: false,
        }
    }

    #[rstest]
    #[case(stat(10, OLD), stat(10, NEW), policy(true, false), Verdict::Decided(DiffStatus::Touch))]
    #[case(stat(10, NEW), stat(10, OLD), policy(true, true), Verdict::Decided(DiffStatus::Touch))]
    #[case(
        stat(10, OLD),
        stat(10, NEW),
        policy(false, false),
        Verdict::NeedsContent { equal: DiffStatus::Touch, differ: DiffStatus::ReplaceA }
    )]
    #[case(
        stat(10, OLD),
        stat(12, NEW),
        policy(true, false),
        Verdict::NeedsContent { equal: DiffStatus::Touch, differ: DiffStatus::ReplaceA }
    )]
    #[case(
        stat(12, NEW),
        stat(10, OLD),
        policy(false, false),
        Verdict::NeedsContent { equal: DiffStatus::Touch, differ: DiffStatus::ReplaceB }
    )]
    #[case(stat(10, OLD), stat(12, OLD), policy(false, false), Verdict::Decided(DiffStatus::Conflict))]
    #[case(stat(10, OLD), stat(12, OLD), policy(true, true), Verdict::Decided(DiffStatus::Conflict))]
    #[case(stat(10, OLD), stat(10, OLD), policy(false, false), Verdict::Decided(DiffStatus::Clean))]
    #[case(stat(10, OLD), stat(10, OLD), policy(true, false), Verdict::Decided(DiffStatus::Clean))]
    #[case(
        stat(10, OLD),
        stat(10, OLD),
        policy(false, true),
        Verdict::NeedsContent { equal: DiffStatus::Clean, differ: DiffStatus::Conflict }
    )]
    fn test_decision_matrix(
        #[case] a: FileStat,
        #[case] b: FileStat,
        #[case] policy: ComparePolicy,
        #[case] expected: Verdict,
    ) {
        assert_eq!(FileComparator::decide(&a, &b, &policy), expected);
    }

    #[test]
    fn test_same_size_flag_skips_content_check() {
        // Same size, different timestamps: the flag alone must yield Touch even
        // though the contents would differ.
        let verdict = FileComparator::decide(&stat(4, OLD), &stat(4, NEW), &policy(true, false));
        assert_eq!(verdict, Verdict::Decided(DiffStatus::Touch));

        let verdict = FileComparator::decide(&stat(4, OLD), &stat(4, NEW), &policy(false, false));
        assert!(matches!(verdict, Verdict::NeedsContent { .. }));
    }

    async fn write_pair(
        dir: &TempDir,
        a: &str,
        b: &str,
        mtime_a: i64,
        mtime_b: i64,
    ) -> (PathBuf, PathBuf) {
        let path_a = dir.path().join("a.bin");
        let path_b = dir.path().join("b.bin");
        tokio::fs::write(&path_a, a).await.unwrap();
        tokio::fs::write(&path_b, b).await.unwrap();
        filetime::set_file_mtime(&path_a, FileTime::from_unix_time(mtime_a, 0)).unwrap();
        filetime::set_file_mtime(&path_b, FileTime::from_unix_time(mtime_b, 0)).unwrap();
        (path_a, path_b)
    }

    #[rstest]
    #[case("same", "same", OLD, NEW, DiffStatus::Touch)]
    #[case("old!", "new!", OLD, NEW, DiffStatus::ReplaceA)]
    #[case("new!", "old!", NEW, OLD, DiffStatus::ReplaceB)]
    #[case("same", "same", OLD, OLD, DiffStatus::Clean)]
    #[case("short", "longer", OLD, OLD, DiffStatus::Conflict)]
    #[tokio::test]
    async fn test_compare_reads_content(
        #[case] content_a: &str,
        #[case] content_b: &str,
        #[case] mtime_a: i64,
        #[case] mtime_b: i64,
        #[case] expected: DiffStatus,
    ) {
        let dir = TempDir::new().unwrap();
        let (path_a, path_b) = write_pair(&dir, content_a, content_b, mtime_a, mtime_b).await;

        let comparator = FileComparator::new(ComparePolicy::default(), FileCopier::new());
        assert_eq!(comparator.compare(&path_a, &path_b).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_same_size_same_mtime_different_content_is_clean() {
        let dir = TempDir::new().unwrap();
        let content_a = "a".repeat(100);
        let content_b = "b".repeat(100);
        let (path_a, path_b) = write_pair(&dir, &content_a, &content_b, OLD, OLD).await;

        let comparator = FileComparator::new(ComparePolicy::default(), FileCopier::new());
        assert_eq!(
            comparator.compare(&path_a, &path_b).await.unwrap(),
            DiffStatus::Clean
        );
    }

    #[tokio::test]
    async fn test_verify_content_detects_silent_change() {
        let dir = TempDir::new().unwrap();
        let (path_a, path_b) = write_pair(&dir, "abcd", "abce", OLD, OLD).await;

        let relaxed = FileComparator::new(policy(false, false), FileCopier::new());
        assert_eq!(relaxed.compare(&path_a, &path_b).await.unwrap(), DiffStatus::Clean);

        let strict = FileComparator::new(policy(false, true), FileCopier::new());
        assert_eq!(strict.compare(&path_a, &path_b).await.unwrap(), DiffStatus::Conflict);
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let comparator = FileComparator::default();
        let error = comparator.compare(&missing, &missing).await.unwrap_err();
        assert!(matches!(error, Error::Io { path, .. } if path == missing));
    }
}
