use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use basalt_common::Digest;
use parking_lot::Mutex;
use wasmtime::Module;

/// LRU cache of parsed WASM modules keyed by program id.
///
/// Hand-rolled rather than pulled from a crate, same as the teacher's
/// habit of writing its own small hot-path structures (`Memory`, `Stack`)
/// instead of reaching for a dependency. All operations run under one
/// mutex; the critical section is a hashmap lookup plus a short splice of
/// a `VecDeque`, never the module parse itself.
pub struct ModuleCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    entries: HashMap<Digest, Arc<Module>>,
    /// Most-recently-used id at the front.
    order: VecDeque<Digest>,
}

impl ModuleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Returns the cached module for `id`, if present, moving it to
    /// most-recently-used.
    pub fn get(&self, id: &Digest) -> Option<Arc<Module>> {
        let mut inner = self.inner.lock();
        let module = inner.entries.get(id).cloned()?;
        inner.order.retain(|k| k != id);
        inner.order.push_front(*id);
        Some(module)
    }

    /// Inserts `module` under `id`, evicting the least-recently-used entry
    /// if the cache is at capacity. Eviction drops the cache's own `Arc`;
    /// any in-flight execution still holding a clone keeps the module
    /// alive until it finishes.
    pub fn put(&self, id: Digest, module: Arc<Module>) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            inner.order.retain(|k| *k != id);
        } else if inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_back() {
                inner.entries.remove(&evicted);
            }
        }
        inner.order.push_front(id);
        inner.entries.insert(id, module);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    fn dummy_module(engine: &Engine) -> Arc<Module> {
        // the smallest valid WASM module: just the magic number and version.
        Arc::new(Module::new(engine, b"\0asm\x01\0\0\0").unwrap())
    }

    #[test]
    fn get_on_hit_promotes_to_most_recent_and_eviction_takes_the_other() {
        let engine = Engine::default();
        let cache = ModuleCache::new(2);
        let a = Digest::from_bytes([1u8; 32]);
        let b = Digest::from_bytes([2u8; 32]);
        let c = Digest::from_bytes([3u8; 32]);

        cache.put(a, dummy_module(&engine));
        cache.put(b, dummy_module(&engine));
        assert!(cache.get(&a).is_some());
        cache.put(c, dummy_module(&engine));

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn miss_returns_none() {
        let cache = ModuleCache::new(4);
        assert!(cache.get(&Digest::from_bytes([9u8; 32])).is_none());
    }
}
