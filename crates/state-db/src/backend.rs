use std::collections::BTreeMap;

use basalt_common::Digest;

/// An ordered byte-key/byte-value map backing a single [`crate::delta::StateDelta`]'s
/// own overlay.
///
/// A delta's backend only ever holds the writes made directly against that
/// delta - resolving a key against ancestors is the delta layer's job, not
/// the backend's. The reference implementation here keeps everything in a
/// `BTreeMap`; a disk-backed implementation (RocksDB, redb, ...) would
/// implement the same trait and slot in without the delta/index layers
/// changing at all.
pub trait Backend: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Writes `key` to `value`, returning the signed byte delta
    /// (`new_size - old_size`): a fresh key costs `len(key) + len(value)`, an
    /// overwrite costs the difference against the previous value.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> i64;

    /// Removes `key` if present, returning the signed byte delta (zero or
    /// negative).
    fn remove(&mut self, key: &[u8]) -> i64;

    /// The smallest key strictly greater than `key`, or the smallest key
    /// overall when `key` is empty.
    fn next_after(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)>;

    /// The largest key strictly less than `key`.
    fn prev_before(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)>;

    fn clone_box(&self) -> Box<dyn Backend>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id(&self) -> Digest;
    fn set_id(&mut self, id: Digest);

    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
}

/// The in-memory reference `Backend`. Every example repo in this workspace's
/// lineage keeps its "plain" backing store as a sorted in-memory map before
/// growing a disk-backed one; this is that starting point, and the only
/// backend this crate ships.
#[derive(Default)]
pub struct InMemoryBackend {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    id: Digest,
    revision: u64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for InMemoryBackend {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> i64 {
        let new_size = (key.len() + value.len()) as i64;
        let old_size = self
            .map
            .get(&key)
            .map(|v| (key.len() + v.len()) as i64)
            .unwrap_or(0);
        self.map.insert(key, value);
        new_size - old_size
    }

    fn remove(&mut self, key: &[u8]) -> i64 {
        match self.map.remove(key) {
            Some(v) => -((key.len() + v.len()) as i64),
            None => 0,
        }
    }

    fn next_after(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        use std::ops::Bound;
        self.map
            .range((Bound::Excluded(key.to_vec()), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    fn prev_before(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        use std::ops::Bound;
        self.map
            .range((Bound::Unbounded, Bound::Excluded(key.to_vec())))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    fn clone_box(&self) -> Box<dyn Backend> {
        Box::new(InMemoryBackend {
            map: self.map.clone(),
            id: self.id,
            revision: self.revision,
        })
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn id(&self) -> Digest {
        self.id
    }

    fn set_id(&mut self, id: Digest) {
        self.id = id;
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_of_new_key_costs_its_full_size() {
        let mut b = InMemoryBackend::new();
        assert_eq!(b.put(b"k".to_vec(), b"value".to_vec()), 6);
    }

    #[test]
    fn overwrite_costs_the_difference() {
        let mut b = InMemoryBackend::new();
        b.put(b"k".to_vec(), b"aaaa".to_vec());
        assert_eq!(b.put(b"k".to_vec(), b"a".to_vec()), -3);
    }

    #[test]
    fn next_after_empty_key_yields_smallest() {
        let mut b = InMemoryBackend::new();
        b.put(b"b".to_vec(), vec![]);
        b.put(b"a".to_vec(), vec![]);
        assert_eq!(b.next_after(b"").unwrap().0, b"a".to_vec());
    }

    #[test]
    fn prev_before_finds_predecessor() {
        let mut b = InMemoryBackend::new();
        b.put(b"a".to_vec(), vec![]);
        b.put(b"c".to_vec(), vec![]);
        assert_eq!(b.prev_before(b"c").unwrap().0, b"a".to_vec());
    }
}
