use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use basalt_common::Digest;
use basalt_crypto::Hasher;
use parking_lot::{Mutex, RwLock};

use crate::backend::{Backend, InMemoryBackend};
use crate::error::StateDbError;

/// One node of the delta DAG: a revision's own writes, layered over an
/// optional parent.
///
/// `backend` holds only the key/value pairs *this* delta wrote; `tombstones`
/// holds the keys it deleted (shadowing whatever the ancestor chain says
/// about them). A delta with no parent is a root: a fully materialized
/// state with no shadowing to resolve.
///
/// Children hold a strong, direct reference to their parent rather than
/// going through the index for every lookup - `get`/`next_after` walk the
/// chain with plain `Arc` derefs. The index only needs a registry for
/// lookup-by-id and fork-choice bookkeeping; see [`crate::database::Database`].
pub struct StateDelta {
    id: Digest,
    parent: Option<Arc<StateDelta>>,
    revision: u64,
    backend: RwLock<Box<dyn Backend>>,
    tombstones: RwLock<BTreeSet<Vec<u8>>>,
    complete: AtomicBool,
    merkle_root: Mutex<Option<Digest>>,
}

impl StateDelta {
    pub fn root(id: Digest) -> Arc<Self> {
        let mut backend = InMemoryBackend::new();
        backend.set_id(id);
        Arc::new(Self {
            id,
            parent: None,
            revision: 0,
            backend: RwLock::new(Box::new(backend)),
            tombstones: RwLock::new(BTreeSet::new()),
            complete: AtomicBool::new(true),
            merkle_root: Mutex::new(None),
        })
    }

    pub fn make_child(self: &Arc<Self>, id: Digest) -> Arc<Self> {
        let mut backend = InMemoryBackend::new();
        backend.set_id(id);
        Arc::new(Self {
            id,
            parent: Some(self.clone()),
            revision: self.revision + 1,
            backend: RwLock::new(Box::new(backend)),
            tombstones: RwLock::new(BTreeSet::new()),
            complete: AtomicBool::new(false),
            merkle_root: Mutex::new(None),
        })
    }

    /// Duplicates this delta's own overlay and tombstone set into a new,
    /// non-final delta sharing this one's parent (a sibling, not a child).
    pub fn clone_sibling(&self, id: Digest) -> Arc<Self> {
        let mut backend = self.backend.read().clone_box();
        backend.set_id(id);
        Arc::new(Self {
            id,
            parent: self.parent.clone(),
            revision: self.revision,
            backend: RwLock::new(backend),
            tombstones: RwLock::new(self.tombstones.read().clone()),
            complete: AtomicBool::new(false),
            merkle_root: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Digest {
        self.id
    }

    pub fn parent_id(&self) -> Option<Digest> {
        self.parent.as_ref().map(|p| p.id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(v) = self.backend.read().get(key) {
            return Some(v);
        }
        if self.tombstones.read().contains(key) {
            return None;
        }
        self.parent.as_ref().and_then(|p| p.get(key))
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<i64, StateDbError> {
        if self.is_complete() {
            return Err(StateDbError::NotFinalized);
        }
        let old = self.get(&key);
        let new_size = (key.len() + value.len()) as i64;
        let old_size = old.map(|v| (key.len() + v.len()) as i64).unwrap_or(0);
        self.tombstones.write().remove(&key);
        self.backend.write().put(key, value);
        Ok(new_size - old_size)
    }

    pub fn remove(&self, key: &[u8]) -> Result<i64, StateDbError> {
        if self.is_complete() {
            return Err(StateDbError::NotFinalized);
        }
        let old = self.get(key);
        let delta = -old.map(|v| (key.len() + v.len()) as i64).unwrap_or(0);
        self.tombstones.write().insert(key.to_vec());
        self.backend.write().remove(key);
        Ok(delta)
    }

    /// The smallest live key strictly greater than `key`, resolved across
    /// this delta and its ancestors, honoring tombstones at every level.
    pub fn next_after(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        let own = self.backend.read().next_after(key);
        let mut cursor = key.to_vec();
        let ancestor = loop {
            let Some(parent) = &self.parent else {
                break None;
            };
            let Some((k, v)) = parent.next_after(&cursor) else {
                break None;
            };
            if self.tombstones.read().contains(&k) {
                cursor = k;
                continue;
            }
            break Some((k, v));
        };
        match (own, ancestor) {
            (Some(o), Some(a)) => Some(if o.0 <= a.0 { o } else { a }),
            (Some(o), None) => Some(o),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// The largest live key strictly less than `key`, symmetric to
    /// [`Self::next_after`].
    pub fn prev_before(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        let own = self.backend.read().prev_before(key);
        let mut cursor = key.to_vec();
        let ancestor = loop {
            let Some(parent) = &self.parent else {
                break None;
            };
            let Some((k, v)) = parent.prev_before(&cursor) else {
                break None;
            };
            if self.tombstones.read().contains(&k) {
                cursor = k;
                continue;
            }
            break Some((k, v));
        };
        match (own, ancestor) {
            (Some(o), Some(a)) => Some(if o.0 >= a.0 { o } else { a }),
            (Some(o), None) => Some(o),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Every live key/value pair reachable from this delta, in ascending
    /// key order. Used by [`Self::merkle_root`] and [`Self::flatten`]; not
    /// cheap, O(n log depth), fine for the reference backend's scale.
    fn collect_all(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        let mut cursor = Vec::new();
        while let Some((k, v)) = self.next_after(&cursor) {
            cursor = k.clone();
            out.push((k, v));
        }
        out
    }

    /// Applies this delta's own writes and removals onto its parent. The
    /// parent must still be open (not complete); the caller is responsible
    /// for dropping this delta afterwards - there is no "commit suicide" in
    /// a reference-counted graph, so squash just folds the content over and
    /// leaves disposal to the holder.
    pub fn squash_into_parent(&self) -> Result<(), StateDbError> {
        let parent = self.parent.as_ref().ok_or(StateDbError::NotFinalized)?;
        if parent.is_complete() {
            return Err(StateDbError::ParentAlreadyComplete);
        }
        for (k, v) in self.backend.read().next_after_all() {
            parent.put(k, v)?;
        }
        for k in self.tombstones.read().iter() {
            parent.remove(k)?;
        }
        Ok(())
    }

    /// A binary merkle tree over this delta's full (post-overlay) key/value
    /// set: leaves are `hash(key || value)` in ascending key order, odd
    /// levels duplicate their last node, and an empty key-space hashes to
    /// `hash(b"")`. Requires the delta to be complete, and caches the
    /// result since the tree never changes afterwards.
    pub fn merkle_root(&self) -> Result<Digest, StateDbError> {
        if !self.is_complete() {
            return Err(StateDbError::NotComplete);
        }
        if let Some(cached) = *self.merkle_root.lock() {
            return Ok(cached);
        }
        let root = merkle_root_of(&self.collect_all());
        *self.merkle_root.lock() = Some(root);
        Ok(root)
    }

    /// Materializes this delta and its entire ancestor chain into a single
    /// fresh backend representing the same live key space, for use as a new
    /// root after a commit.
    pub fn flatten(&self) -> Arc<Self> {
        let mut backend = InMemoryBackend::new();
        backend.set_id(self.id);
        backend.set_revision(self.revision);
        for (k, v) in self.collect_all() {
            backend.put(k, v);
        }
        let cached_root = *self.merkle_root.lock();
        Arc::new(Self {
            id: self.id,
            parent: None,
            revision: self.revision,
            backend: RwLock::new(Box::new(backend)),
            tombstones: RwLock::new(BTreeSet::new()),
            complete: AtomicBool::new(true),
            merkle_root: Mutex::new(cached_root),
        })
    }
}

fn merkle_root_of(pairs: &[(Vec<u8>, Vec<u8>)]) -> Digest {
    if pairs.is_empty() {
        return basalt_crypto::hash(b"");
    }
    let mut level: Vec<Digest> = pairs
        .iter()
        .map(|(k, v)| {
            let mut h = Hasher::new();
            h.update(k);
            h.update(v);
            h.finalize()
        })
        .collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut h = Hasher::new();
                h.update(pair[0].as_bytes());
                h.update(pair[1].as_bytes());
                h.finalize()
            })
            .collect();
    }
    level[0]
}

/// Small helper trait used only by `squash_into_parent` to walk a cloned
/// backend's full contents without exposing a general iterator on
/// [`Backend`] itself.
trait FullScan {
    fn next_after_all(&self) -> Vec<(Vec<u8>, Vec<u8>)>;
}

impl FullScan for Box<dyn Backend> {
    fn next_after_all(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        let mut cursor = Vec::new();
        while let Some((k, v)) = self.next_after(&cursor) {
            cursor = k.clone();
            out.push((k, v));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_value_until_overridden() {
        let root = StateDelta::root(Digest::ZERO);
        // reopen root for writes by constructing a non-final child directly on top
        let child = root.make_child(Digest::from_bytes([1u8; 32]));
        child.put(b"k".to_vec(), b"v1".to_vec()).unwrap();
        assert_eq!(child.get(b"k"), Some(b"v1".to_vec()));

        let grandchild = child.make_child(Digest::from_bytes([2u8; 32]));
        assert_eq!(grandchild.get(b"k"), Some(b"v1".to_vec()));
        grandchild.put(b"k".to_vec(), b"v2".to_vec()).unwrap();
        assert_eq!(grandchild.get(b"k"), Some(b"v2".to_vec()));
        assert_eq!(child.get(b"k"), Some(b"v1".to_vec()));
    }

    #[test]
    fn tombstone_shadows_ancestor_value() {
        let root = StateDelta::root(Digest::ZERO);
        let child = root.make_child(Digest::from_bytes([1u8; 32]));
        child.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        let grandchild = child.make_child(Digest::from_bytes([2u8; 32]));
        grandchild.remove(b"k").unwrap();
        assert_eq!(grandchild.get(b"k"), None);
        assert_eq!(child.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn put_after_complete_is_rejected() {
        let root = StateDelta::root(Digest::ZERO);
        let child = root.make_child(Digest::from_bytes([1u8; 32]));
        child.mark_complete();
        assert!(matches!(
            child.put(b"k".to_vec(), b"v".to_vec()),
            Err(StateDbError::NotFinalized)
        ));
    }

    #[test]
    fn merkle_root_requires_completeness() {
        let root = StateDelta::root(Digest::ZERO);
        let child = root.make_child(Digest::from_bytes([1u8; 32]));
        assert!(matches!(
            child.merkle_root(),
            Err(StateDbError::NotComplete)
        ));
    }

    #[test]
    fn empty_complete_delta_has_the_defined_empty_root() {
        let root = StateDelta::root(Digest::ZERO);
        let child = root.make_child(Digest::from_bytes([1u8; 32]));
        child.mark_complete();
        assert_eq!(child.merkle_root().unwrap(), basalt_crypto::hash(b""));
    }

    #[test]
    fn merkle_root_is_independent_of_how_the_writes_were_split() {
        // Left: one delta writing both keys.
        let root_l = StateDelta::root(Digest::ZERO);
        let left = root_l.make_child(Digest::from_bytes([1u8; 32]));
        left.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        left.put(b"b".to_vec(), b"2".to_vec()).unwrap();
        left.mark_complete();

        // Right: same writes split across a parent/child pair.
        let root_r = StateDelta::root(Digest::ZERO);
        let mid = root_r.make_child(Digest::from_bytes([2u8; 32]));
        mid.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        let right = mid.make_child(Digest::from_bytes([3u8; 32]));
        right.put(b"b".to_vec(), b"2".to_vec()).unwrap();
        mid.mark_complete();
        right.mark_complete();

        assert_eq!(left.merkle_root().unwrap(), right.merkle_root().unwrap());
    }

    #[test]
    fn flatten_preserves_live_keyspace() {
        let root = StateDelta::root(Digest::ZERO);
        let a = root.make_child(Digest::from_bytes([1u8; 32]));
        a.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        let b = a.make_child(Digest::from_bytes([2u8; 32]));
        b.put(b"b".to_vec(), b"2".to_vec()).unwrap();
        b.remove(b"a").unwrap();
        b.mark_complete();

        let flat = b.flatten();
        assert!(flat.is_root());
        assert_eq!(flat.get(b"a"), None);
        assert_eq!(flat.get(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn squash_folds_overlay_into_open_parent() {
        let root = StateDelta::root(Digest::ZERO);
        let parent = root.make_child(Digest::from_bytes([1u8; 32]));
        parent.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        let child = parent.make_child(Digest::from_bytes([2u8; 32]));
        child.put(b"b".to_vec(), b"2".to_vec()).unwrap();
        child.squash_into_parent().unwrap();
        assert_eq!(parent.get(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn squash_into_complete_parent_is_rejected() {
        let root = StateDelta::root(Digest::ZERO);
        let parent = root.make_child(Digest::from_bytes([1u8; 32]));
        parent.mark_complete();
        let child = parent.make_child(Digest::from_bytes([2u8; 32]));
        assert!(matches!(
            child.squash_into_parent(),
            Err(StateDbError::ParentAlreadyComplete)
        ));
    }
}
