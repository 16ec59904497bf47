//! Bounded FIFO membership set.
//!
//! Eviction is strictly by insertion order. Lookups do not refresh an entry,
//! so a resource queried on every scroll still leaves the cache once
//! `capacity` newer resources have been added after it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of resource identifiers remembered.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// Ordered set of loaded resource identifiers with FIFO eviction.
#[derive(Debug)]
pub struct ResourceCache {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: u64,
}

impl ResourceCache {
    /// Create an empty cache holding at most `capacity` identifiers.
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            members: HashSet::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: 0,
        }
    }

    /// Membership test. Does not alter eviction order.
    pub fn has(&self, id: &str) -> bool {
        let hit = self.members.contains(id);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Append `id` if absent, evicting the oldest entries while over capacity.
    pub fn add(&mut self, id: &str) {
        if self.members.contains(id) {
            return;
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        self.evict_over_capacity();
    }

    /// Change the capacity, evicting the oldest entries if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_over_capacity();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget every identifier.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Identifiers in eviction order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions,
            entries: self.order.len(),
            capacity: self.capacity,
        }
    }

    fn evict_over_capacity(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                self.evictions += 1;
                tracing::trace!(resource = %oldest, "Resource cache evicted oldest entry");
            }
        }
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
