//! Arena-backed tree of detected differences
//!
//! Every node names one relative path present under location A, location B or
//! both. Nodes live in a single `Vec` and refer to each other through
//! [`NodeId`]s. Detaching a node unlinks it from its parent but keeps its slot,
//! so ids handed out earlier stay valid for the lifetime of the tree.

use crate::root::{display_path, RootContext};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use treesync_io::FileCopier;
use treesync_types::{DiffStatus, EntryKind, Error, Result, Side};

/// Index of a node inside its [`DiffTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every tree
    pub const ROOT: Self = Self(0);

    /// Position in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// One difference between the two locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffNode {
    relative_path: PathBuf,
    status: DiffStatus,
    kind_a: Option<EntryKind>,
    kind_b: Option<EntryKind>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    by_name: HashMap<OsString, NodeId>,
}

impl DiffNode {
    /// Path relative to both roots; empty for the root node
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// `/`-prefixed rendering of the relative path (`/docs/a.txt`, root is `/`)
    pub fn display_path(&self) -> String {
        display_path(&self.relative_path)
    }

    /// Last path component; empty for the root node
    pub fn name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Current status
    pub fn status(&self) -> DiffStatus {
        self.status
    }

    /// Entry kind observed under the given side, `None` if absent there
    pub fn kind(&self, side: Side) -> Option<EntryKind> {
        match side {
            Side::A => self.kind_a,
            Side::B => self.kind_b,
        }
    }

    /// Whether the two sides hold different kinds of entries
    pub fn is_kind_mismatch(&self) -> bool {
        matches!(
            (self.kind_a, self.kind_b),
            (Some(a), Some(b)) if a != b
        )
    }

    /// Whether the node stands for a directory
    ///
    /// Decided by the side that will be read or kept for the current status.
    /// `Clean` nodes are directories and `Touch` nodes are files.
    pub fn is_directory(&self) -> bool {
        match self.status.relevant_side() {
            Some(side) => self.kind(side).is_some_and(EntryKind::is_directory),
            None => match self.status {
                DiffStatus::Clean => true,
                DiffStatus::Touch => false,
                _ => self
                    .kind_a
                    .or(self.kind_b)
                    .is_some_and(EntryKind::is_directory),
            },
        }
    }

    /// Parent node; `None` for the root and for detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node has children
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// The hierarchical, mutable model of detected differences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTree {
    nodes: Vec<DiffNode>,
}

impl DiffTree {
    /// A tree holding only the `Clean` root
    pub fn new() -> Self {
        Self {
            nodes: vec![DiffNode {
                relative_path: PathBuf::new(),
                status: DiffStatus::Clean,
                kind_a: Some(EntryKind::Directory),
                kind_b: Some(EntryKind::Directory),
                parent: None,
                children: Vec::new(),
                by_name: HashMap::new(),
            }],
        }
    }

    /// The root node id
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&DiffNode> {
        self.nodes.get(id.0)
    }

    /// Look up a node, treating an unknown id as a broken invariant
    pub fn get(&self, id: NodeId) -> Result<&DiffNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| Error::inconsistent(format!("node {} does not exist", id.0)))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut DiffNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| Error::inconsistent(format!("node {} does not exist", id.0)))
    }

    /// Whether the root has no children
    pub fn is_clean(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Append a child named `name` under `parent`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] when the parent is unknown or
    /// detached, a sibling already uses `name`, or the status is not legal
    /// for the node's kind.
    pub fn add_child<N: AsRef<OsStr>>(
        &mut self,
        parent: NodeId,
        name: N,
        status: DiffStatus,
        kind_a: Option<EntryKind>,
        kind_b: Option<EntryKind>,
    ) -> Result<NodeId> {
        let name = name.as_ref();
        if !self.is_attached(parent) {
            return Err(Error::inconsistent(format!(
                "cannot add '{}' below a detached node",
                Path::new(name).display()
            )));
        }
        if kind_a.is_none() && kind_b.is_none() {
            return Err(Error::inconsistent(format!(
                "node '{}' exists on neither side",
                Path::new(name).display()
            )));
        }

        let parent_node = self.get(parent)?;
        let relative_path = parent_node.relative_path.join(name);
        if parent_node.by_name.contains_key(name) {
            return Err(Error::inconsistent(format!(
                "duplicate node '{}'",
                display_path(&relative_path)
            )));
        }

        let node = DiffNode {
            relative_path,
            status,
            kind_a,
            kind_b,
            parent: Some(parent),
            children: Vec::new(),
            by_name: HashMap::new(),
        };
        check_status(&node, status)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        let parent_node = self.get_mut(parent)?;
        parent_node.children.push(id);
        parent_node.by_name.insert(name.to_os_string(), id);
        Ok(id)
    }

    /// Replace the status of a node
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] when the status is not legal for
    /// the node's kind.
    pub fn set_status(&mut self, id: NodeId, status: DiffStatus) -> Result<()> {
        check_status(self.get(id)?, status)?;
        self.get_mut(id)?.status = status;
        Ok(())
    }

    /// Invert the status of a node and of its whole subtree
    pub fn flip(&mut self, id: NodeId) -> Result<()> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = self.get(current)?;
            let inverted = node.status.invert()?;
            pending.extend(node.children.iter().copied());
            self.set_status(current, inverted)?;
        }
        Ok(())
    }

    /// Unlink a node from its parent
    ///
    /// The node keeps its own subtree and its slot in the arena.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] for the root, for an already
    /// detached node, or when the parent does not list the node.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let node = self.get(id)?;
        let parent = node.parent.ok_or_else(|| {
            Error::inconsistent(format!(
                "node '{}' has no parent to be removed from",
                node.display_path()
            ))
        })?;
        let display = node.display_path();
        let name = node.relative_path.file_name().map(OsStr::to_os_string);

        let parent_node = self.get_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .rposition(|&child| child == id)
            .ok_or_else(|| {
                Error::inconsistent(format!(
                    "child removal failed because '{}' is not listed by its parent",
                    display
                ))
            })?;
        parent_node.children.remove(position);
        if let Some(name) = name {
            parent_node.by_name.remove(&name);
        }
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == NodeId::ROOT {
                return true;
            }
            match self.node(current).and_then(|node| node.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Remove every childless `Clean` node below the root, bottom-up
    ///
    /// Returns the number of nodes removed.
    pub fn prune(&mut self) -> usize {
        let mut removed = 0;
        for id in self.post_order(NodeId::ROOT) {
            if id == NodeId::ROOT {
                continue;
            }
            let node = &self.nodes[id.0];
            if node.status == DiffStatus::Clean && node.children.is_empty() && self.detach(id).is_ok()
            {
                removed += 1;
            }
        }
        removed
    }

    /// Number of attached nodes below `id`
    pub fn count_descendants(&self, id: NodeId) -> usize {
        self.pre_order(id).len().saturating_sub(1)
    }

    /// Attached nodes below the root whose status is not `Clean`, depth first
    pub fn collect_actionable(&self) -> Vec<NodeId> {
        self.pre_order(NodeId::ROOT)
            .into_iter()
            .filter(|&id| id != NodeId::ROOT && self.nodes[id.0].status != DiffStatus::Clean)
            .collect()
    }

    /// Attached nodes from `id` downwards in depth-first pre-order
    pub fn pre_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if self.node(id).is_none() {
            return order;
        }
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            order.push(current);
            pending.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        order
    }

    fn post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut pending = vec![(id, false)];
        while let Some((current, expanded)) = pending.pop() {
            if expanded {
                order.push(current);
            } else {
                pending.push((current, true));
                pending.extend(
                    self.nodes[current.0]
                        .children
                        .iter()
                        .map(|&child| (child, false)),
                );
            }
        }
        order
    }

    /// Find the attached node for a relative path
    pub fn find(&self, relative_path: &Path) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for component in relative_path.components() {
            current = *self.nodes[current.0]
                .by_name
                .get(component.as_os_str())?;
        }
        Some(current)
    }

    /// Side holding the more recently modified entry; `None` when equal
    pub async fn newer_side(&self, id: NodeId, roots: &RootContext) -> Result<Option<Side>> {
        Ok(match self.compare_mtimes(id, roots).await? {
            Ordering::Greater => Some(Side::A),
            Ordering::Less => Some(Side::B),
            Ordering::Equal => None,
        })
    }

    /// Side holding the less recently modified entry; `None` when equal
    pub async fn older_side(&self, id: NodeId, roots: &RootContext) -> Result<Option<Side>> {
        Ok(self.newer_side(id, roots).await?.map(Side::other))
    }

    async fn compare_mtimes(&self, id: NodeId, roots: &RootContext) -> Result<Ordering> {
        let relative = self.get(id)?.relative_path();
        let mtime_a = FileCopier::modified(&roots.absolute_a(relative)).await?;
        let mtime_b = FileCopier::modified(&roots.absolute_b(relative)).await?;
        Ok(mtime_a.cmp(&mtime_b))
    }
}

impl Default for DiffTree {
    fn default() -> Self {
        Self::new()
    }
}

fn check_status(node: &DiffNode, status: DiffStatus) -> Result<()> {
    let relevant_kind = match status.relevant_side() {
        Some(side) => node.kind(side),
        None => node.kind_a.or(node.kind_b),
    };
    let is_directory = relevant_kind.is_some_and(EntryKind::is_directory);

    let legal = if relevant_kind.is_none() {
        false
    } else if node.is_kind_mismatch() {
        !matches!(
            status,
            DiffStatus::Clean | DiffStatus::Touch | DiffStatus::Conflict
        )
    } else if is_directory {
        status.is_directory_legal()
    } else {
        status != DiffStatus::Clean
    };

    if legal {
        Ok(())
    } else {
        Err(Error::inconsistent(format!(
            "status '{}' is not allowed for {} '{}'",
            status,
            if is_directory { "directory" } else { "file" },
            node.display_path()
        )))
    }
}
