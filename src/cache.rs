use ahash::AHashMap;
use parking_lot::RwLock;

use crate::graph::GraphEdge;

/// Per-direction adjacency lists keyed by entity id; cleared on every edge write.
#[derive(Default)]
pub struct AdjacencyCache {
    inner: RwLock<AHashMap<i64, Vec<GraphEdge>>>,
}

impl AdjacencyCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, key: i64) -> Option<Vec<GraphEdge>> {
        self.inner.read().get(&key).cloned()
    }

    pub fn insert(&self, key: i64, value: Vec<GraphEdge>) {
        self.inner.write().insert(key, value);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
