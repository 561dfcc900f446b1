//! Per-collection element cache
//!
//! A bounded read cache in front of the shard files. Writes go through
//! it; when full, an arbitrary entry is evicted.

use dashmap::DashMap;
use shardb_core::Element;
use std::sync::Arc;

/// Bounded element cache keyed by element id
#[derive(Debug)]
pub struct CollectionCache {
    entries: DashMap<u64, Arc<Element>>,
    capacity: usize,
}

impl CollectionCache {
    /// Create an empty cache holding at most `capacity` elements
    pub fn new(capacity: usize) -> Self {
        CollectionCache {
            entries: DashMap::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Cached element
    pub fn get(&self, id: u64) -> Option<Arc<Element>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Cache an element, evicting one entry if full
    pub fn insert(&self, element: Arc<Element>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&element.id) {
            let victim = self.entries.iter().next().map(|entry| *entry.key());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(element.id, element);
    }

    /// Drop a cached element
    pub fn invalidate(&self, id: u64) {
        self.entries.remove(&id);
    }

    /// Number of cached elements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every cached element
    pub fn clear(&self) {
        self.entries.clear();
    }
}
