use std::sync::{Arc, Weak};

use basalt_common::{Digest, ObjectSpace};

use crate::database::Database;
use crate::delta::StateDelta;
use crate::error::StateDbError;

fn scoped_get(delta: &StateDelta, space: &ObjectSpace, key: &[u8]) -> Option<Vec<u8>> {
    delta.get(&space.compound_key(key))
}

fn scoped_put(
    delta: &StateDelta,
    space: &ObjectSpace,
    key: &[u8],
    value: Vec<u8>,
) -> Result<i64, StateDbError> {
    delta.put(space.compound_key(key), value)
}

fn scoped_remove(delta: &StateDelta, space: &ObjectSpace, key: &[u8]) -> Result<i64, StateDbError> {
    delta.remove(&space.compound_key(key))
}

fn scoped_next(
    delta: &StateDelta,
    space: &ObjectSpace,
    key: &[u8],
) -> Option<(Vec<u8>, Vec<u8>)> {
    let prefix = space.encode_prefix();
    let (k, v) = delta.next_after(&space.compound_key(key))?;
    k.strip_prefix(&prefix[..]).map(|suffix| (suffix.to_vec(), v))
}

fn scoped_previous(
    delta: &StateDelta,
    space: &ObjectSpace,
    key: &[u8],
) -> Option<(Vec<u8>, Vec<u8>)> {
    let prefix = space.encode_prefix();
    let (k, v) = delta.prev_before(&space.compound_key(key))?;
    k.strip_prefix(&prefix[..]).map(|suffix| (suffix.to_vec(), v))
}

/// An ephemeral, unregistered branch of the delta graph, used for
/// speculative execution (a transaction's working set, a nested program
/// call). Never known to a [`Database`]; the caller either [`Self::squash`]es
/// it back into its parent or simply drops it to discard the work.
///
/// Cheaply `Clone`: it is just an `Arc` handle onto the same delta, so
/// handing a copy to e.g. a host-call bridge shared across nested VM
/// invocations is free.
#[derive(Clone)]
pub struct TemporaryStateNode {
    delta: Arc<StateDelta>,
}

impl TemporaryStateNode {
    pub fn new(parent: Arc<StateDelta>, id: Digest) -> Self {
        Self {
            delta: parent.make_child(id),
        }
    }

    pub fn id(&self) -> Digest {
        self.delta.id()
    }

    pub fn revision(&self) -> u64 {
        self.delta.revision()
    }

    pub fn get(&self, space: &ObjectSpace, key: &[u8]) -> Option<Vec<u8>> {
        scoped_get(&self.delta, space, key)
    }

    pub fn put(&self, space: &ObjectSpace, key: &[u8], value: Vec<u8>) -> Result<i64, StateDbError> {
        scoped_put(&self.delta, space, key, value)
    }

    pub fn remove(&self, space: &ObjectSpace, key: &[u8]) -> Result<i64, StateDbError> {
        scoped_remove(&self.delta, space, key)
    }

    pub fn next(&self, space: &ObjectSpace, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        scoped_next(&self.delta, space, key)
    }

    pub fn previous(&self, space: &ObjectSpace, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        scoped_previous(&self.delta, space, key)
    }

    /// Spawns a further speculative child of this node, e.g. a nested
    /// program call's own working set.
    pub fn make_child(&self, id: Digest) -> TemporaryStateNode {
        TemporaryStateNode {
            delta: self.delta.make_child(id),
        }
    }

    /// A duplicate of this node's own overlay and tombstones, sharing its
    /// parent - a sibling, not a child.
    pub fn clone_node(&self, id: Digest) -> TemporaryStateNode {
        TemporaryStateNode {
            delta: self.delta.clone_sibling(id),
        }
    }

    /// Folds this node's writes into its parent. Consumes `self`: once
    /// squashed, there is nothing left to hold onto.
    pub fn squash(self) -> Result<(), StateDbError> {
        self.delta.squash_into_parent()
    }

    /// Marks this node's delta final, unblocking [`Self::merkle_root`] and
    /// letting it be promoted via [`Database::install_permanent`].
    pub fn mark_complete(&self) {
        self.delta.mark_complete();
    }

    pub fn merkle_root(&self) -> Result<Digest, StateDbError> {
        self.delta.merkle_root()
    }

    /// Consumes this node, handing back its underlying delta so it can be
    /// registered with a [`Database`] directly (see
    /// [`Database::install_permanent`]) instead of rebuilt via
    /// [`PermanentStateNode::make_child`].
    pub fn into_delta(self) -> Arc<StateDelta> {
        self.delta
    }
}

/// A registered node of the delta graph: one per block. Backed by the same
/// [`StateDelta`] machinery as a temporary node, plus the operations that
/// only make sense for a node the [`Database`] knows about.
pub struct PermanentStateNode {
    delta: Arc<StateDelta>,
    index: Weak<Database>,
}

impl PermanentStateNode {
    pub(crate) fn new(delta: Arc<StateDelta>, index: Weak<Database>) -> Self {
        Self { delta, index }
    }

    pub fn id(&self) -> Digest {
        self.delta.id()
    }

    pub fn revision(&self) -> u64 {
        self.delta.revision()
    }

    pub fn is_complete(&self) -> bool {
        self.delta.is_complete()
    }

    pub fn get(&self, space: &ObjectSpace, key: &[u8]) -> Option<Vec<u8>> {
        scoped_get(&self.delta, space, key)
    }

    pub fn put(&self, space: &ObjectSpace, key: &[u8], value: Vec<u8>) -> Result<i64, StateDbError> {
        scoped_put(&self.delta, space, key, value)
    }

    pub fn remove(&self, space: &ObjectSpace, key: &[u8]) -> Result<i64, StateDbError> {
        scoped_remove(&self.delta, space, key)
    }

    pub fn next(&self, space: &ObjectSpace, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        scoped_next(&self.delta, space, key)
    }

    pub fn previous(&self, space: &ObjectSpace, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        scoped_previous(&self.delta, space, key)
    }

    /// Spawns a temporary (unregistered) working node for a block or
    /// transaction to execute speculatively against.
    pub fn make_temporary_child(&self, id: Digest) -> TemporaryStateNode {
        TemporaryStateNode {
            delta: self.delta.make_child(id),
        }
    }

    /// Creates and registers a new permanent child. Requires this node to
    /// already be complete.
    pub fn make_child(&self, id: Digest) -> Result<PermanentStateNode, StateDbError> {
        let index = self.index.upgrade().ok_or(StateDbError::NoRoot)?;
        if !self.delta.is_complete() {
            return Err(StateDbError::ParentNotComplete);
        }
        let child = self.delta.make_child(id);
        index.add(child.clone())?;
        Ok(PermanentStateNode {
            delta: child,
            index: self.index.clone(),
        })
    }

    /// A registered duplicate of this node's own content, sharing its
    /// parent.
    pub fn clone_node(&self, id: Digest) -> Result<PermanentStateNode, StateDbError> {
        let index = self.index.upgrade().ok_or(StateDbError::NoRoot)?;
        let cloned = self.delta.clone_sibling(id);
        index.add(cloned.clone())?;
        Ok(PermanentStateNode {
            delta: cloned,
            index: self.index.clone(),
        })
    }

    /// Marks this node final and lets the index's fork choice decide
    /// whether it becomes the new head.
    pub fn mark_complete(&self) -> Result<(), StateDbError> {
        let index = self.index.upgrade().ok_or(StateDbError::NoRoot)?;
        index.mark_complete(self.delta.id())
    }

    pub fn merkle_root(&self) -> Result<Digest, StateDbError> {
        self.delta.merkle_root()
    }

    /// Flattens this node and its ancestry into the new root, purging
    /// everything outside its subtree.
    pub fn commit(&self) -> Result<(), StateDbError> {
        let index = self.index.upgrade().ok_or(StateDbError::NoRoot)?;
        index.commit(self.delta.id())
    }

    /// Abandons this node (and its subtree), removing it from the index.
    pub fn discard(&self) -> Result<(), StateDbError> {
        let index = self.index.upgrade().ok_or(StateDbError::NoRoot)?;
        index.remove(self.delta.id(), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ObjectSpace {
        ObjectSpace::program([7u8; 32], 0)
    }

    #[test]
    fn temporary_node_squash_applies_to_parent_delta() {
        let root = StateDelta::root(Digest::ZERO);
        let parent_node = TemporaryStateNode::new(root, Digest::from_bytes([1u8; 32]));
        let child = parent_node.make_child(Digest::from_bytes([2u8; 32]));
        child.put(&space(), b"k", b"v".to_vec()).unwrap();
        child.squash().unwrap();
        assert_eq!(parent_node.get(&space(), b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn permanent_node_lifecycle_through_database() {
        let db = Database::new();
        let root_delta = db.open(Digest::ZERO).unwrap();
        let root = PermanentStateNode::new(root_delta, Arc::downgrade(&db));

        let child = root.make_child(Digest::from_bytes([1u8; 32])).unwrap();
        child.put(&space(), b"k", b"v".to_vec()).unwrap();
        child.mark_complete().unwrap();
        assert_eq!(db.head().unwrap().id(), child.id());

        let root_value = child.merkle_root().unwrap();
        child.commit().unwrap();
        assert_eq!(db.root().unwrap().merkle_root().unwrap(), root_value);
    }

    #[test]
    fn next_and_previous_are_scoped_to_the_object_space() {
        let root = StateDelta::root(Digest::ZERO);
        let node = TemporaryStateNode::new(root, Digest::from_bytes([1u8; 32]));
        let a = ObjectSpace::program([1u8; 32], 0);
        let b = ObjectSpace::program([2u8; 32], 0);
        node.put(&a, b"x", b"in-a".to_vec()).unwrap();
        node.put(&b, b"y", b"in-b".to_vec()).unwrap();

        let (k, v) = node.next(&a, b"").unwrap();
        assert_eq!(k, b"x");
        assert_eq!(v, b"in-a");
        assert!(node.next(&a, b"x").is_none());
    }
}
