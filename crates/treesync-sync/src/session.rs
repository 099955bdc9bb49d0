//! Owner of the roots, the run lock and the current difference tree
//!
//! A [`Session`] is cheap to clone; clones share the same tree, lock and
//! change notifications. Every comparison replaces the tree, and every change
//! to it bumps a generation counter observable through [`Session::subscribe`].

use crate::builder::{RunOutcome, TreeBuilder};
use crate::engine::{SyncEngine, SyncReport};
use crate::filter::RegexNameFilter;
use crate::lock::RunLock;
use crate::root::RootContext;
use crate::tree::{DiffTree, NodeId};
use std::sync::Arc;
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use treesync_config::{Config, ConfigLoader};
use treesync_io::FileCopier;
use treesync_types::{ComparePolicy, Error, LogSink, NameFilter, ProgressSink, Result};

/// Comparison and synchronization of one pair of locations
#[derive(Clone)]
pub struct Session {
    roots: RootContext,
    filter: Arc<dyn NameFilter>,
    policy: ComparePolicy,
    copier: FileCopier,
    rescan_after_sync: bool,
    lock: Arc<RunLock>,
    tree: Arc<RwLock<DiffTree>>,
    generation: Arc<watch::Sender<u64>>,
}

impl Session {
    /// Create a session for `roots` configured by `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when an ignore pattern does not compile.
    pub fn new(roots: RootContext, config: &Config) -> Result<Self> {
        let filter = RegexNameFilter::from_config(&config.filter)?;
        Ok(Self::with_filter(roots, config, Arc::new(filter)))
    }

    /// Create a session configured from the default locations
    ///
    /// Reads the first `treesync.{yaml,yml,toml}` found in the working
    /// directory or the user configuration directory, then `TREESYNC_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration cannot be loaded or
    /// does not validate.
    pub fn from_default_config(roots: RootContext) -> Result<Self> {
        let config = ConfigLoader::load_default()?;
        debug!(
            "Loaded configuration: log level {}, {} ignore patterns",
            config.logging.level,
            config.filter.ignore_patterns.len()
        );
        Self::new(roots, &config)
    }

    /// Create a session using a caller-provided name filter
    pub fn with_filter(roots: RootContext, config: &Config, filter: Arc<dyn NameFilter>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            roots,
            filter,
            policy: config.comparison.policy(),
            copier: FileCopier::with_buffer_size(config.io.buffer_size),
            rescan_after_sync: config.session.rescan_after_sync,
            lock: Arc::new(RunLock::new()),
            tree: Arc::new(RwLock::new(DiffTree::new())),
            generation: Arc::new(generation),
        }
    }

    /// The validated locations
    pub fn roots(&self) -> &RootContext {
        &self.roots
    }

    /// The comparison policy in effect
    pub fn policy(&self) -> ComparePolicy {
        self.policy
    }

    /// Whether a comparison or synchronization is running
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    /// Read access to the current tree
    ///
    /// Waits while a synchronization is mutating the tree.
    pub async fn tree(&self) -> RwLockReadGuard<'_, DiffTree> {
        self.tree.read().await
    }

    /// Copy of the current tree
    pub async fn snapshot(&self) -> DiffTree {
        self.tree.read().await.clone()
    }

    /// Every attached node whose status is not `Clean`, depth first
    pub async fn collect_actionable(&self) -> Vec<NodeId> {
        self.tree.read().await.collect_actionable()
    }

    /// Receiver notified whenever the tree is replaced or changed
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Current generation of the tree
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Invert the status of a node and of its subtree
    pub async fn flip(&self, id: NodeId) -> Result<()> {
        self.tree.write().await.flip(id)?;
        self.bump();
        Ok(())
    }

    /// Compare both locations and replace the current tree
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] when another run holds the lock.
    pub async fn compare(&self, sink: &dyn ProgressSink, log: &dyn LogSink) -> Result<RunOutcome> {
        let _guard = self.lock.try_guard().ok_or(Error::Busy)?;
        self.compare_locked(sink, log).await
    }

    /// Apply `selection` to the filesystem
    ///
    /// The ids refer to the tree current at the time of the call. When the
    /// session rescans after synchronizing, the tree is rebuilt unless the
    /// run was cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] when another run holds the lock.
    pub async fn synchronize(
        &self,
        selection: &[NodeId],
        sink: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<SyncReport> {
        let _guard = self.lock.try_guard().ok_or(Error::Busy)?;
        self.synchronize_locked(selection, sink, log).await
    }

    /// Run [`Session::compare`] on a new task
    ///
    /// The lock is taken before spawning, so a busy session fails right away.
    pub fn spawn_compare(
        &self,
        sink: Arc<dyn ProgressSink>,
        log: Arc<dyn LogSink>,
    ) -> Result<JoinHandle<Result<RunOutcome>>> {
        let guard = self.lock.try_guard_owned().ok_or(Error::Busy)?;
        let session = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            session.compare_locked(sink.as_ref(), log.as_ref()).await
        }))
    }

    /// Run [`Session::synchronize`] on a new task
    pub fn spawn_synchronize(
        &self,
        selection: Vec<NodeId>,
        sink: Arc<dyn ProgressSink>,
        log: Arc<dyn LogSink>,
    ) -> Result<JoinHandle<Result<SyncReport>>> {
        let guard = self.lock.try_guard_owned().ok_or(Error::Busy)?;
        let session = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            session
                .synchronize_locked(&selection, sink.as_ref(), log.as_ref())
                .await
        }))
    }

    async fn compare_locked(&self, sink: &dyn ProgressSink, log: &dyn LogSink) -> Result<RunOutcome> {
        let report = TreeBuilder::new(self.copier)
            .build(&self.roots, self.filter.as_ref(), &self.policy, sink, log)
            .await?;
        info!(
            "Comparison found {} differences",
            report.tree.count_descendants(NodeId::ROOT)
        );
        *self.tree.write().await = report.tree;
        self.bump();
        Ok(report.outcome)
    }

    async fn synchronize_locked(
        &self,
        selection: &[NodeId],
        sink: &dyn ProgressSink,
        log: &dyn LogSink,
    ) -> Result<SyncReport> {
        let report = {
            let mut tree = self.tree.write().await;
            SyncEngine::new(self.copier)
                .apply(&mut tree, &self.roots, selection, sink, log)
                .await
        };
        self.bump();
        let report = report?;

        if self.rescan_after_sync && !report.outcome.is_cancelled() {
            debug!("Rescanning after synchronization");
            self.compare_locked(sink, log).await?;
        }
        Ok(report)
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("roots", &self.roots)
            .field("policy", &self.policy)
            .field("rescan_after_sync", &self.rescan_after_sync)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::ActivityLog;
    use crate::progress::NullProgress;
    use std::path::Path;
    use tempfile::TempDir;
    use treesync_types::DiffStatus;

    struct Fixture {
        a: TempDir,
        b: TempDir,
        session: Session,
    }

    fn fixture(config: &Config) -> Fixture {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = RootContext::initialize(a.path(), b.path()).unwrap();
        let session = Session::new(roots, config).unwrap();
        Fixture { a, b, session }
    }

    #[tokio::test]
    async fn test_compare_replaces_tree_and_notifies() {
        let fixture = fixture(&Config::default());
        std::fs::write(fixture.a.path().join("new.txt"), "new").unwrap();
        let mut changes = fixture.session.subscribe();

        let outcome = fixture
            .session
            .compare(&NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
        let tree = fixture.session.tree().await;
        let node = tree.find(Path::new("new.txt")).unwrap();
        assert_eq!(tree.get(node).unwrap().status(), DiffStatus::CopyToB);
    }

    #[tokio::test]
    async fn test_default_config_session_compares() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        std::fs::write(b.path().join("old.txt"), "old").unwrap();
        let roots = RootContext::initialize(a.path(), b.path()).unwrap();

        let session = Session::from_default_config(roots).unwrap();
        assert!(!session.is_busy());
        session
            .compare(&NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap();
        let tree = session.tree().await;
        let node = tree.find(Path::new("old.txt")).unwrap();
        assert_eq!(tree.get(node).unwrap().status(), DiffStatus::RemoveFromB);
    }

    #[tokio::test]
    async fn test_busy_session_rejects_runs() {
        let fixture = fixture(&Config::default());
        let held = fixture.session.lock.try_guard().unwrap();

        let error = fixture
            .session
            .compare(&NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Busy));
        assert!(matches!(
            fixture
                .session
                .spawn_compare(Arc::new(NullProgress::new()), Arc::new(ActivityLog::new())),
            Err(Error::Busy)
        ));

        drop(held);
        assert!(!fixture.session.is_busy());
    }

    #[tokio::test]
    async fn test_spawned_sync_rescans() {
        let fixture = fixture(&Config::default());
        std::fs::write(fixture.a.path().join("new.txt"), "new").unwrap();
        let log: Arc<dyn LogSink> = Arc::new(ActivityLog::new());
        let sink: Arc<dyn ProgressSink> = Arc::new(NullProgress::new());

        fixture
            .session
            .spawn_compare(Arc::clone(&sink), Arc::clone(&log))
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        let selection = fixture.session.collect_actionable().await;
        assert_eq!(selection.len(), 1);

        let report = fixture
            .session
            .spawn_synchronize(selection, sink, log)
            .unwrap()
            .await
            .unwrap()
            .unwrap();

        assert!(report.outcome.is_completed());
        assert!(fixture.b.path().join("new.txt").exists());
        assert!(fixture.session.tree().await.is_clean());
        assert!(!fixture.session.is_busy());
        assert_eq!(fixture.session.generation(), 3);
    }

    #[tokio::test]
    async fn test_flip_reverses_direction() {
        let fixture = fixture(&Config::default());
        std::fs::write(fixture.b.path().join("only_b.txt"), "b").unwrap();
        fixture
            .session
            .compare(&NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap();

        let id = fixture.session.collect_actionable().await[0];
        fixture.session.flip(id).await.unwrap();
        let snapshot = fixture.session.snapshot().await;
        assert_eq!(snapshot.get(id).unwrap().status(), DiffStatus::CopyToA);

        let mut config = Config::default();
        config.session.rescan_after_sync = false;
        let session = Session::new(fixture.session.roots().clone(), &config).unwrap();
        session
            .compare(&NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap();
        let id = session.collect_actionable().await[0];
        session.flip(id).await.unwrap();
        session
            .synchronize(&[id], &NullProgress::new(), &ActivityLog::new())
            .await
            .unwrap();

        assert!(fixture.a.path().join("only_b.txt").exists());
        assert!(session.tree().await.is_clean());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = RootContext::initialize(a.path(), b.path()).unwrap();
        let mut config = Config::default();
        config.filter.ignore_patterns = vec!["(".to_string()];
        assert!(matches!(
            Session::new(roots, &config),
            Err(Error::Config { .. })
        ));
    }
}
