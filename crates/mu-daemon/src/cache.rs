//! Short-lived LRU for algorithm results
//!
//! Entries carry the graph version they were computed against;
//! invalidation is a version compare on lookup, so any committed
//! change set makes older entries misses without a sweep.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub op: &'static str,
    pub node_id: String,
    pub edge_types: String,
}

struct Entry {
    version: u64,
    value: serde_json::Value,
}

pub struct AlgoCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    order: VecDeque<CacheKey>,
}

impl AlgoCache {
    pub fn new(capacity: usize) -> Self {
        AlgoCache {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Hit only when the cached entry matches the current version.
    pub fn get(&self, key: &CacheKey, version: u64) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock().ok()?;
        let stale = match inner.entries.get(key) {
            Some(entry) if entry.version == version => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if stale {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
        }
        None
    }

    pub fn put(&self, key: CacheKey, version: u64, value: serde_json::Value) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, Entry { version, value });
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
