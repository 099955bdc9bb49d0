//! Applies selected differences to the filesystem

use crate::builder::RunOutcome;
use crate::log::log_event;
use crate::progress::{WorkMeter, WORK_MAX};
use crate::root::RootContext;
use crate::tree::{DiffTree, NodeId};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use treesync_io::FileCopier;
use treesync_types::{CopyStats, DiffStatus, Error, LogSink, ProgressSink, Result, Side};

/// Counters collected while applying a selection
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Nodes whose action ran and that were removed from the tree
    pub applied: u64,
    /// Nodes left alone (clean, conflicting or already covered)
    pub skipped: u64,
    /// Bytes written by copy and replace actions
    pub bytes_copied: u64,
    /// Entries deleted by remove actions
    pub removed: u64,
    /// Files whose timestamp was equalized
    pub touched: u64,
    /// Per-file copy counters
    pub copy: CopyStats,
    /// Wall time of the run
    pub duration: Duration,
}

/// Result of a synchronization run
#[derive(Debug)]
pub struct SyncReport {
    /// Counters for the run
    pub stats: SyncStats,
    /// How the run ended
    pub outcome: RunOutcome,
}

/// Mutates both locations according to the statuses of selected nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncEngine {
    copier: FileCopier,
}

impl SyncEngine {
    /// Create an engine copying through `copier`
    pub fn new(copier: FileCopier) -> Self {
        Self { copier }
    }

    /// Apply the nodes of `selection` in list order
    ///
    /// Every node that was applied is detached from `tree`, and the tree is
    /// pruned however the run ends. An I/O failure or cancellation stops the
    /// remaining queue without rolling back earlier actions; a file being
    /// copied at that moment is deleted. Broken invariants are returned as
    /// `Err`.
    pub async fn apply(
        &self,
        tree: &mut DiffTree,
        roots: &RootContext,
        selection: &[NodeId],
        sink: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<SyncReport> {
        let start_time = Instant::now();
        info!("Synchronizing {} selected nodes", selection.len());
        log_event(log, "Starting synchronization process.");
        sink.begin("Synchronization", WORK_MAX);

        let mut stats = SyncStats::default();
        let result = self
            .run(tree, roots, selection, sink, log, &mut stats)
            .await;

        let pruned = tree.prune();
        debug!("Pruned {} clean nodes", pruned);
        sink.done();
        stats.duration = start_time.elapsed();

        let outcome = match result {
            Ok(()) => {
                info!(
                    "Synchronization completed: {} applied, {} skipped, {} bytes in {:?} ({:.0} bytes/s)",
                    stats.applied,
                    stats.skipped,
                    stats.bytes_copied,
                    stats.duration,
                    stats.copy.transfer_rate()
                );
                log_event(log, "Finished synchronization process.");
                RunOutcome::Completed
            }
            Err(error) if error.is_cancelled() => {
                log_event(log, "Synchronization process cancelled.");
                RunOutcome::Cancelled
            }
            Err(error) if error.is_fatal() => {
                error!("Synchronization hit an inconsistent state: {}", error);
                log_event(log, "Synchronization process failed.");
                return Err(error);
            }
            Err(error) => {
                warn!(kind = ?error.kind(), "Synchronization failed: {}", error);
                log_event(log, "Synchronization process failed.");
                RunOutcome::Failed(error)
            }
        };

        Ok(SyncReport { stats, outcome })
    }

    async fn run(
        &self,
        tree: &mut DiffTree,
        roots: &RootContext,
        selection: &[NodeId],
        sink: &dyn ProgressSink,
        log: &dyn LogSink,
        stats: &mut SyncStats,
    ) -> Result<()> {
        sink.sub_task("Calculating number of bytes to copy");
        let total = bytes_to_copy(tree, roots, selection).await?;
        debug!("{} bytes to copy", total);

        sink.sub_task("Synchronization in progress");
        let mut meter = WorkMeter::new(sink, total);

        for &id in selection {
            meter.check_cancelled()?;

            if id == NodeId::ROOT || !tree.is_attached(id) {
                stats.skipped += 1;
                continue;
            }

            let node = tree.get(id)?;
            let status = node.status();
            let relative = node.relative_path().to_path_buf();

            match status {
                DiffStatus::Clean | DiffStatus::Conflict | DiffStatus::FileVsFolderConflict => {
                    debug!("Skipping '{}' ({})", node.display_path(), status);
                    stats.skipped += 1;
                    continue;
                }
                DiffStatus::Unknown => {
                    return Err(Error::inconsistent(format!(
                        "node '{}' has no status to apply",
                        node.display_path()
                    )));
                }
                DiffStatus::CopyToA
                | DiffStatus::CopyToB
                | DiffStatus::ReplaceA
                | DiffStatus::ReplaceB => {
                    let (source_side, target_side) = sides(status)?;
                    let source = roots.absolute(source_side, &relative);
                    let target = roots.absolute(target_side, &relative);
                    if matches!(status, DiffStatus::ReplaceA | DiffStatus::ReplaceB) {
                        FileCopier::remove(&target).await?;
                    }
                    log_event(log, &format!("Copying '{}'", source.display()));
                    let copied = self.copier.copy(&source, &target, &mut meter).await?;
                    stats.bytes_copied += copied.bytes_copied;
                    stats.copy.merge(&copied);
                }
                DiffStatus::RemoveFromA | DiffStatus::RemoveFromB => {
                    let (_, target_side) = sides(status)?;
                    let target = roots.absolute(target_side, &relative);
                    log_event(log, &format!("Deleting '{}'", target.display()));
                    FileCopier::remove(&target).await?;
                    stats.removed += 1;
                }
                DiffStatus::Touch => {
                    let older = tree.older_side(id, roots).await?.ok_or_else(|| {
                        Error::inconsistent(format!(
                            "'{}' has equal timestamps on both sides and cannot be touched",
                            crate::root::display_path(&relative)
                        ))
                    })?;
                    let older_path = roots.absolute(older, &relative);
                    let newer_path = roots.absolute(older.other(), &relative);
                    log_event(log, &format!("Touching file '{}'", older_path.display()));
                    FileCopier::touch(&older_path, &newer_path).await?;
                    stats.touched += 1;
                }
            }

            tree.detach(id)?;
            stats.applied += 1;
        }

        Ok(())
    }
}

/// Source and target side of a status that moves data
fn sides(status: DiffStatus) -> Result<(Side, Side)> {
    let target = status.target_side().ok_or_else(|| {
        Error::inconsistent(format!("status '{}' does not write anywhere", status))
    })?;
    Ok((target.other(), target))
}

/// Bytes that applying `selection` will read
///
/// Only copy and replace actions read data. A node below a selected,
/// actionable ancestor is already covered by that ancestor.
pub async fn bytes_to_copy(
    tree: &DiffTree,
    roots: &RootContext,
    selection: &[NodeId],
) -> Result<u64> {
    let actionable: HashSet<NodeId> = selection
        .iter()
        .copied()
        .filter(|&id| {
            tree.is_attached(id)
                && tree
                    .node(id)
                    .is_some_and(|node| node.status().is_actionable())
        })
        .collect();

    let mut total = 0u64;
    for &id in &actionable {
        if has_selected_ancestor(tree, id, &actionable) {
            continue;
        }
        let node = tree.get(id)?;
        if let Some(source) = node.status().source_side() {
            total += FileCopier::total_bytes(&roots.absolute(source, node.relative_path())).await?;
        }
    }
    Ok(total)
}

fn has_selected_ancestor(tree: &DiffTree, id: NodeId, selected: &HashSet<NodeId>) -> bool {
    let mut current = tree.node(id).and_then(|node| node.parent());
    while let Some(ancestor) = current {
        if selected.contains(&ancestor) {
            return true;
        }
        current = tree.node(ancestor).and_then(|node| node.parent());
    }
    false
}
