//! Recursive comparison of the two locations
//!
//! [`TreeBuilder`] walks both roots in lockstep and records every difference
//! as a node of a fresh [`DiffTree`]. Directories present on both sides get a
//! tentative `Clean` node that is dropped again when nothing below it differs.

use crate::comparator::FileComparator;
use crate::log::log_event;
use crate::progress::{WorkMeter, WORK_MAX};
use crate::root::{display_path, RootContext};
use crate::tree::{DiffTree, NodeId};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, error, info, warn};
use treesync_io::FileCopier;
use treesync_types::{
    ComparePolicy, DiffStatus, EntryKind, Error, LogSink, NameFilter, ProgressSink, Result,
};
use walkdir::WalkDir;

/// How a comparison or synchronization run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step ran
    Completed,
    /// The progress sink asked to stop
    Cancelled,
    /// An I/O or path problem stopped the run
    Failed(Error),
}

impl RunOutcome {
    /// Whether the run went all the way through
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The error that stopped the run, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Result of a comparison run
///
/// The tree is always usable: after a cancellation or failure it holds the
/// differences found so far, pruned.
#[derive(Debug)]
pub struct BuildReport {
    /// Detected differences
    pub tree: DiffTree,
    /// How the run ended
    pub outcome: RunOutcome,
}

/// Builds a [`DiffTree`] from two locations
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBuilder {
    copier: FileCopier,
}

impl TreeBuilder {
    /// Create a builder reading file contents through `copier`
    pub fn new(copier: FileCopier) -> Self {
        Self { copier }
    }

    /// Compare both locations of `roots`
    ///
    /// Cancellation and I/O failures are reported through
    /// [`BuildReport::outcome`]; only broken internal invariants are returned
    /// as `Err`.
    pub async fn build(
        &self,
        roots: &RootContext,
        filter: &dyn NameFilter,
        policy: &ComparePolicy,
        sink: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<BuildReport> {
        info!(
            "Comparing '{}' with '{}'",
            roots.path_a().display(),
            roots.path_b().display()
        );
        sink.begin("Differentiation", WORK_MAX);

        let mut walk = Walk {
            roots,
            filter,
            policy: *policy,
            comparator: FileComparator::new(*policy, self.copier),
            meter: WorkMeter::new(sink, 0),
            log,
            tree: DiffTree::new(),
        };
        let result = walk.run().await;

        let Walk { mut tree, .. } = walk;
        let pruned = tree.prune();
        debug!("Pruned {} clean nodes", pruned);
        sink.done();

        let outcome = match result {
            Ok(()) => {
                log_event(log, "Comparison finished.");
                RunOutcome::Completed
            }
            Err(error) if error.is_cancelled() => {
                log_event(log, "Comparison cancelled.");
                RunOutcome::Cancelled
            }
            Err(error) if error.is_fatal() => {
                error!("Comparison hit an inconsistent state: {}", error);
                log_event(log, &format!("Comparison failed: {}", error));
                return Err(error);
            }
            Err(error) => {
                warn!(kind = ?error.kind(), "Comparison failed: {}", error);
                log_event(log, &format!("Comparison failed: {}", error));
                RunOutcome::Failed(error)
            }
        };

        Ok(BuildReport { tree, outcome })
    }
}

/// State of one comparison run
struct Walk<'a> {
    roots: &'a RootContext,
    filter: &'a dyn NameFilter,
    policy: ComparePolicy,
    comparator: FileComparator,
    meter: WorkMeter<'a>,
    log: &'a dyn LogSink,
    tree: DiffTree,
}

impl Walk<'_> {
    async fn run(&mut self) -> Result<()> {
        self.meter.check_cancelled()?;

        let description = "Analysing directory structure of A";
        self.meter.sink().sub_task(description);
        log_event(self.log, description);
        let total = count_files(self.roots.path_a(), self.filter).await?;
        self.meter = WorkMeter::new(self.meter.sink(), total);

        let description = "Comparing directory content of A and B";
        self.meter.sink().sub_task(description);
        log_event(self.log, description);
        self.scan_directory(NodeId::ROOT).await
    }

    fn scan_directory<'b>(
        &'b mut self,
        node: NodeId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'b>> {
        Box::pin(async move {
            let relative = self.tree.get(node)?.relative_path().to_path_buf();
            let dir_a = self.roots.absolute_a(&relative);
            let dir_b = self.roots.absolute_b(&relative);
            debug!("Scanning '{}'", display_path(&relative));

            let entries_a = list_directory(&dir_a).await?;
            let mut entries_b: BTreeMap<OsString, EntryKind> =
                list_directory(&dir_b).await?.into_iter().collect();

            for (name, kind_a) in entries_a {
                if self.filter.is_ignored(&name.to_string_lossy()) {
                    entries_b.remove(&name);
                    continue;
                }

                match entries_b.remove(&name) {
                    None => {
                        self.tree.add_child(
                            node,
                            &name,
                            DiffStatus::CopyToB,
                            Some(kind_a),
                            None,
                        )?;
                        let files = self.files_below(&dir_a.join(&name), kind_a).await?;
                        self.meter.advance(files)?;
                    }
                    Some(kind_b) if kind_a != kind_b => {
                        self.tree.add_child(
                            node,
                            &name,
                            DiffStatus::FileVsFolderConflict,
                            Some(kind_a),
                            Some(kind_b),
                        )?;
                        let files = self.files_below(&dir_a.join(&name), kind_a).await?;
                        self.meter.advance(files)?;
                    }
                    Some(EntryKind::Directory) => {
                        let child = self.tree.add_child(
                            node,
                            &name,
                            DiffStatus::Clean,
                            Some(EntryKind::Directory),
                            Some(EntryKind::Directory),
                        )?;
                        self.scan_directory(child).await?;
                        if !self.tree.get(child)?.has_children() {
                            self.tree.detach(child)?;
                        }
                    }
                    Some(EntryKind::File) => {
                        self.compare_files(node, &name, &dir_a.join(&name), &dir_b.join(&name))
                            .await?;
                        self.meter.advance(1)?;
                    }
                }
            }

            for (name, kind_b) in entries_b {
                if self.filter.is_ignored(&name.to_string_lossy()) {
                    continue;
                }
                self.tree
                    .add_child(node, &name, DiffStatus::RemoveFromB, None, Some(kind_b))?;
                self.meter.advance(0)?;
            }

            Ok(())
        })
    }

    async fn compare_files(
        &mut self,
        parent: NodeId,
        name: &OsStr,
        file_a: &Path,
        file_b: &Path,
    ) -> Result<()> {
        let status = self.comparator.compare(file_a, file_b).await?;
        if status == DiffStatus::Touch && self.policy.implicit_timestamp_sync {
            let mtime_a = FileCopier::modified(file_a).await?;
            let mtime_b = FileCopier::modified(file_b).await?;
            let (older, newer) = if mtime_a < mtime_b {
                (file_a, file_b)
            } else {
                (file_b, file_a)
            };
            log_event(self.log, &format!("Touching file '{}'", older.display()));
            return FileCopier::touch(older, newer).await;
        }

        if status != DiffStatus::Clean {
            self.tree.add_child(
                parent,
                name,
                status,
                Some(EntryKind::File),
                Some(EntryKind::File),
            )?;
        }
        Ok(())
    }

    async fn files_below(&self, path: &Path, kind: EntryKind) -> Result<u64> {
        match kind {
            EntryKind::File => Ok(1),
            EntryKind::Directory => count_files(path, self.filter).await,
        }
    }
}

/// Entries of `dir` with their kinds, sorted by name
///
/// Symbolic links are classified by their target; dangling links are files.
async fn list_directory(dir: &Path) -> Result<Vec<(OsString, EntryKind)>> {
    let mut reader = fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let metadata = FileCopier::entry_metadata(&entry.path()).await?;
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        entries.push((entry.file_name(), kind));
    }
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(entries)
}

/// Number of files at or below `root` whose names are not ignored
pub async fn count_files(root: &Path, filter: &dyn NameFilter) -> Result<u64> {
    let root_path = root.to_path_buf();
    let names = tokio::task::spawn_blocking(move || collect_file_names(&root_path))
        .await
        .map_err(|e| Error::io(root, std::io::Error::other(e)))??;
    Ok(names
        .iter()
        .filter(|components| !components.iter().any(|name| filter.is_ignored(name)))
        .count() as u64)
}

/// Relative components of every file below `root`
///
/// The filter is applied afterwards so the blocking walk needs no borrowed state.
fn collect_file_names(root: &Path) -> Result<Vec<Vec<String>>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                files.push(components_below(root, entry.path()));
            }
            Ok(_) => {}
            Err(e) => match e.path() {
                Some(path) if FileCopier::is_dangling_link(path) => {
                    files.push(components_below(root, path));
                }
                path => {
                    let path = path.map_or_else(|| root.to_path_buf(), PathBuf::from);
                    return Err(Error::io(path, e.into()));
                }
            },
        }
    }
    Ok(files)
}

fn components_below(root: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect()
}
