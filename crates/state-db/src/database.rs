use std::collections::HashMap;
use std::sync::Arc;

use basalt_common::Digest;
use parking_lot::RwLock;

use crate::delta::StateDelta;
use crate::error::StateDbError;
use crate::fork_choice::{FifoForkChoice, ForkChoice};
use crate::state_node::PermanentStateNode;

struct Inner {
    nodes: HashMap<Digest, Arc<StateDelta>>,
    children: HashMap<Digest, Vec<Digest>>,
    root_id: Option<Digest>,
    head_id: Option<Digest>,
}

impl Inner {
    fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            root_id: None,
            head_id: None,
        }
    }
}

/// The delta DAG's index: tracks every permanent node by id, the
/// parent/children adjacency, and which fork is the current head.
///
/// Mirrors the "index owns the delta graph; nodes hold a non-owning
/// reference back to the index" split: a [`crate::state_node::PermanentStateNode`]
/// holds a `Weak<Database>` and calls back in on `mark_complete`, `commit`,
/// and `discard`, while the graph traversal itself (`get`, parent chains)
/// lives on [`StateDelta`] directly via strong `Arc` links.
pub struct Database {
    inner: RwLock<Inner>,
    fork_choice: Box<dyn ForkChoice>,
}

impl Database {
    pub fn new() -> Arc<Self> {
        Self::with_fork_choice(Box::new(FifoForkChoice))
    }

    pub fn with_fork_choice(fork_choice: Box<dyn ForkChoice>) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner::empty()),
            fork_choice,
        })
    }

    /// Opens the database on a fresh genesis root identified by `genesis_id`.
    /// Errors if a root is already open.
    pub fn open(&self, genesis_id: Digest) -> Result<Arc<StateDelta>, StateDbError> {
        let mut inner = self.inner.write();
        if inner.root_id.is_some() {
            return Err(StateDbError::DuplicateNode(genesis_id));
        }
        let root = StateDelta::root(genesis_id);
        inner.nodes.insert(genesis_id, root.clone());
        inner.root_id = Some(genesis_id);
        inner.head_id = Some(genesis_id);
        Ok(root)
    }

    /// Closes the database, dropping every node. Distinct from `reset` only
    /// in that it does not immediately reopen a new genesis.
    pub fn close(&self) {
        *self.inner.write() = Inner::empty();
    }

    /// Discards all state and reopens on a new genesis root.
    pub fn reset(&self, genesis_id: Digest) -> Result<Arc<StateDelta>, StateDbError> {
        self.close();
        self.open(genesis_id)
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().root_id.is_some()
    }

    pub fn root(&self) -> Result<Arc<StateDelta>, StateDbError> {
        let inner = self.inner.read();
        let id = inner.root_id.ok_or(StateDbError::NoRoot)?;
        inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StateDbError::UnknownNode(id))
    }

    pub fn head(&self) -> Result<Arc<StateDelta>, StateDbError> {
        let inner = self.inner.read();
        let id = inner.head_id.ok_or(StateDbError::NoRoot)?;
        inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StateDbError::UnknownNode(id))
    }

    pub fn get(&self, id: Digest) -> Result<Arc<StateDelta>, StateDbError> {
        self.inner
            .read()
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StateDbError::UnknownNode(id))
    }

    pub fn contains(&self, id: Digest) -> bool {
        self.inner.read().nodes.contains_key(&id)
    }

    /// Registers a newly created child delta. Requires the parent to already
    /// be registered and complete, and the child id to be unused.
    pub fn add(&self, delta: Arc<StateDelta>) -> Result<(), StateDbError> {
        let id = delta.id();
        let parent_id = delta.parent_id().ok_or(StateDbError::NoRoot)?;
        let mut inner = self.inner.write();
        if inner.nodes.contains_key(&id) {
            return Err(StateDbError::DuplicateNode(id));
        }
        let parent = inner
            .nodes
            .get(&parent_id)
            .cloned()
            .ok_or(StateDbError::UnknownNode(parent_id))?;
        if !parent.is_complete() {
            return Err(StateDbError::ParentNotComplete);
        }
        inner.nodes.insert(id, delta);
        inner.children.entry(parent_id).or_default().push(id);
        Ok(())
    }

    /// Marks `id` complete and runs fork choice against the current head.
    pub fn mark_complete(&self, id: Digest) -> Result<(), StateDbError> {
        let delta = self.get(id)?;
        delta.mark_complete();
        let mut inner = self.inner.write();
        let new_head = self.fork_choice.choose(inner.head_id, id);
        inner.head_id = Some(new_head);
        Ok(())
    }

    /// Every complete node with no complete child: the tips of every live
    /// fork.
    pub fn fork_heads(&self) -> Vec<Digest> {
        let inner = self.inner.read();
        inner
            .nodes
            .iter()
            .filter(|(_, delta)| delta.is_complete())
            .filter(|(id, _)| {
                inner
                    .children
                    .get(*id)
                    .map(|kids| {
                        !kids
                            .iter()
                            .any(|k| inner.nodes.get(k).is_some_and(|d| d.is_complete()))
                    })
                    .unwrap_or(true)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Flattens `id` and its ancestor chain into a single materialized root,
    /// then purges everything that is not a descendant (or `id` itself)
    /// from the index. Requires `id` to be complete.
    pub fn commit(&self, id: Digest) -> Result<(), StateDbError> {
        let mut inner = self.inner.write();
        let old = inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or(StateDbError::UnknownNode(id))?;
        if !old.is_complete() {
            return Err(StateDbError::NotComplete);
        }
        let new_root = old.flatten();

        let mut keep = std::collections::HashSet::new();
        let mut queue = vec![id];
        while let Some(next) = queue.pop() {
            if keep.insert(next) {
                if let Some(kids) = inner.children.get(&next) {
                    queue.extend(kids.iter().copied());
                }
            }
        }

        inner.nodes.retain(|k, _| keep.contains(k));
        inner.nodes.insert(id, new_root);
        inner.children.retain(|k, _| keep.contains(k));
        if let Some(kids) = inner.children.get_mut(&id) {
            kids.clear();
        }
        inner.root_id = Some(id);
        if inner.head_id.is_none_or(|h| !keep.contains(&h)) {
            inner.head_id = Some(id);
        }
        Ok(())
    }

    /// Removes `id` and its subtree from the index, abandoning that fork,
    /// except any subtree rooted at an id named in `whitelist` - those are
    /// re-parented onto `id`'s own parent instead of being dropped. Refuses
    /// to discard the current root.
    ///
    /// A whitelisted node's own [`StateDelta`] chain still walks up through
    /// the now-discarded ancestors it was built over (that `Arc` chain is
    /// independent of index membership), so preserving it here only needs
    /// to keep the index's head-selection bookkeeping - `nodes`/`children` -
    /// pointed at it; the data underneath remains reachable either way.
    pub fn remove(&self, id: Digest, whitelist: &[Digest]) -> Result<(), StateDbError> {
        let mut inner = self.inner.write();
        if inner.root_id == Some(id) {
            return Err(StateDbError::NotComplete);
        }
        let parent_id = inner
            .nodes
            .get(&id)
            .ok_or(StateDbError::UnknownNode(id))?
            .parent_id();

        let whitelist: std::collections::HashSet<Digest> = whitelist.iter().copied().collect();
        let mut doomed = std::collections::HashSet::new();
        let mut preserved = Vec::new();
        let mut queue = vec![id];
        while let Some(next) = queue.pop() {
            if next != id && whitelist.contains(&next) {
                preserved.push(next);
                continue;
            }
            if doomed.insert(next) {
                if let Some(kids) = inner.children.remove(&next) {
                    queue.extend(kids);
                }
            }
        }
        inner.nodes.retain(|k, _| !doomed.contains(k));
        if let Some(parent_id) = parent_id {
            match inner.children.get_mut(&parent_id) {
                Some(kids) => {
                    kids.retain(|k| *k != id);
                    kids.extend(preserved.iter().copied());
                }
                None if !preserved.is_empty() => {
                    inner.children.insert(parent_id, preserved.clone());
                }
                None => {}
            }
        }
        if inner.head_id.is_some_and(|h| doomed.contains(&h)) {
            inner.head_id = inner.root_id;
        }
        Ok(())
    }

    /// Registers an already-complete delta (the result of running a block
    /// to completion inside a [`crate::state_node::TemporaryStateNode`] and
    /// marking it complete) as a permanent node in one step - an
    /// alternative to [`PermanentStateNode::make_child`], which can only
    /// build a *new* child and requires the parent to already be complete.
    pub fn install_permanent(
        self: &Arc<Self>,
        delta: Arc<StateDelta>,
    ) -> Result<PermanentStateNode, StateDbError> {
        let id = delta.id();
        if !delta.is_complete() {
            return Err(StateDbError::NotComplete);
        }
        self.add(delta.clone())?;
        self.mark_complete(id)?;
        Ok(PermanentStateNode::new(delta, Arc::downgrade(self)))
    }

    /// The current root, wrapped as a [`PermanentStateNode`].
    pub fn root_node(self: &Arc<Self>) -> Result<PermanentStateNode, StateDbError> {
        Ok(PermanentStateNode::new(self.root()?, Arc::downgrade(self)))
    }

    /// The current head, wrapped as a [`PermanentStateNode`].
    pub fn head_node(self: &Arc<Self>) -> Result<PermanentStateNode, StateDbError> {
        Ok(PermanentStateNode::new(self.head()?, Arc::downgrade(self)))
    }

    /// Any registered node by id, wrapped as a [`PermanentStateNode`].
    pub fn node(self: &Arc<Self>, id: Digest) -> Result<PermanentStateNode, StateDbError> {
        Ok(PermanentStateNode::new(self.get(id)?, Arc::downgrade(self)))
    }

    /// Finds the node at `revision` by walking back from the head, falling
    /// through to any node at that revision if the head's own chain does
    /// not pass through one (e.g. a sibling fork).
    pub fn at_revision(&self, revision: u64) -> Result<Arc<StateDelta>, StateDbError> {
        let head = self.head()?;
        let mut cursor = Some(head);
        while let Some(node) = cursor {
            if node.revision() == revision {
                return Ok(node);
            }
            cursor = node.parent_id().and_then(|pid| self.get(pid).ok());
        }
        self.inner
            .read()
            .nodes
            .values()
            .find(|d| d.revision() == revision)
            .cloned()
            .ok_or(StateDbError::UnknownRevision(revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_add_then_commit() {
        let db = Database::new();
        let genesis = Digest::ZERO;
        let root = db.open(genesis).unwrap();

        let a_id = Digest::from_bytes([1u8; 32]);
        let a = root.make_child(a_id);
        db.add(a.clone()).unwrap();
        a.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        db.mark_complete(a_id).unwrap();

        assert_eq!(db.head().unwrap().id(), a_id);
        assert_eq!(db.fork_heads(), vec![a_id]);

        db.commit(a_id).unwrap();
        assert!(db.root().unwrap().is_root());
        assert_eq!(db.get(a_id).unwrap().get(b"k"), Some(b"v".to_vec()));
        assert!(db.get(genesis).is_err());
    }

    #[test]
    fn fifo_fork_choice_keeps_first_completed_head() {
        let db = Database::new();
        let root = db.open(Digest::ZERO).unwrap();

        let a_id = Digest::from_bytes([1u8; 32]);
        let b_id = Digest::from_bytes([2u8; 32]);
        let a = root.make_child(a_id);
        let b = root.make_child(b_id);
        db.add(a).unwrap();
        db.add(b).unwrap();

        db.mark_complete(a_id).unwrap();
        db.mark_complete(b_id).unwrap();
        assert_eq!(db.head().unwrap().id(), a_id);
        assert_eq!(db.fork_heads().len(), 2);
    }

    #[test]
    fn remove_drops_a_subtree() {
        let db = Database::new();
        let root = db.open(Digest::ZERO).unwrap();
        let a_id = Digest::from_bytes([1u8; 32]);
        let a = root.make_child(a_id);
        db.add(a.clone()).unwrap();
        db.mark_complete(a_id).unwrap();

        let b_id = Digest::from_bytes([2u8; 32]);
        let b = a.make_child(b_id);
        db.add(b).unwrap();

        db.remove(a_id, &[]).unwrap();
        assert!(db.get(a_id).is_err());
        assert!(db.get(b_id).is_err());

        // The root's children list must no longer carry the removed fork,
        // not just the removed nodes themselves.
        let root_id = root.id();
        assert_eq!(db.inner.read().children.get(&root_id), Some(&vec![]));
    }

    #[test]
    fn remove_preserves_a_whitelisted_subtree() {
        let db = Database::new();
        let root = db.open(Digest::ZERO).unwrap();
        let a_id = Digest::from_bytes([1u8; 32]);
        let a = root.make_child(a_id);
        db.add(a.clone()).unwrap();
        db.mark_complete(a_id).unwrap();

        let b_id = Digest::from_bytes([2u8; 32]);
        let b = a.make_child(b_id);
        db.add(b).unwrap();
        db.mark_complete(b_id).unwrap();

        let c_id = Digest::from_bytes([3u8; 32]);
        let c = a.make_child(c_id);
        db.add(c).unwrap();

        db.remove(a_id, &[b_id]).unwrap();
        assert!(db.get(a_id).is_err());
        assert!(db.get(c_id).is_err());

        // b survives, re-parented onto a's own parent, and its data (built
        // over the now-discarded `a`) is still fully readable.
        assert!(db.get(b_id).is_ok());
        assert_eq!(db.fork_heads(), vec![b_id]);
    }

    #[test]
    fn at_revision_walks_back_from_head() {
        let db = Database::new();
        let root = db.open(Digest::ZERO).unwrap();
        let a_id = Digest::from_bytes([1u8; 32]);
        let a = root.make_child(a_id);
        db.add(a).unwrap();
        db.mark_complete(a_id).unwrap();
        assert_eq!(db.at_revision(0).unwrap().id(), Digest::ZERO);
        assert_eq!(db.at_revision(1).unwrap().id(), a_id);
        assert!(db.at_revision(7).is_err());
    }
}
