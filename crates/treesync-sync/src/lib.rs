//! Two-way directory comparison and selective synchronization
//!
//! This crate compares two directory trees, keeps the differences in a
//! mutable tree and applies a selected subset of them:
//!
//! - **Comparison**: [`TreeBuilder`] walks both locations and classifies every entry
//!   with a [`DiffStatus`](treesync_types::DiffStatus)
//! - **Difference tree**: [`DiffTree`] is arena-backed; nodes can be flipped,
//!   detached and pruned
//! - **Synchronization**: [`SyncEngine`] copies, replaces, deletes and touches entries
//!   with byte-accurate progress and cooperative cancellation
//! - **Sessions**: [`Session`] owns the locations, the single-flight [`RunLock`]
//!   and the current tree
//!
//! # Examples
//!
//! ```rust,no_run
//! use treesync_config::Config;
//! use treesync_sync::{ActivityLog, NullProgress, RootContext, Session};
//!
//! # async fn example() -> treesync_types::Result<()> {
//! let roots = RootContext::initialize("/data/laptop", "/media/backup")?;
//! let session = Session::new(roots, &Config::default())?;
//! let progress = NullProgress::new();
//! let log = ActivityLog::new();
//!
//! session.compare(&progress, &log).await?;
//! let selection = session.collect_actionable().await;
//! let report = session.synchronize(&selection, &progress, &log).await?;
//! println!("Applied {} differences", report.stats.applied);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod comparator;
pub mod engine;
pub mod filter;
pub mod lock;
pub mod log;
pub mod logging;
pub mod progress;
pub mod root;
pub mod session;
pub mod tree;

pub use builder::{BuildReport, RunOutcome, TreeBuilder};
pub use comparator::{FileComparator, FileStat, Verdict};
pub use engine::{SyncEngine, SyncReport, SyncStats};
pub use filter::RegexNameFilter;
pub use lock::{OwnedRunGuard, RunGuard, RunLock};
pub use log::{log_event, ActivityLog, LogEntry, LogEvent, DEFAULT_LOG_CAPACITY};
pub use logging::init_tracing;
pub use progress::{NullProgress, TracingProgress, WorkMeter, WORK_MAX};
pub use root::{display_path, RootContext};
pub use session::Session;
pub use tree::{DiffNode, DiffTree, NodeId};
