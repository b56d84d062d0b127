//! LRU Cache with TTL Support
//!
//! A thread-safe LRU cache with optional time-to-live expiration. The map and
//! the recency list live behind one lock so that every operation sees them in
//! step.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cache entry with value and metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 1,
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() > ttl)
    }
}

/// Node in the LRU linked list
struct LruNode<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Counters reported by [`LruTtlCache::counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct LruState<K, V> {
    entries: HashMap<K, (usize, CacheEntry<V>)>,
    nodes: Vec<LruNode<K>>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    free: Vec<usize>,
    counters: CacheCounters,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn allocate_node(&mut self, key: K) -> usize {
        let node = LruNode {
            key,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn push_to_head(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(old_head) => self.nodes[old_head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let (idx, entry) = self.entries.remove(key)?;
        self.unlink(idx);
        self.free.push(idx);
        Some(entry.value)
    }

    fn evict_lru(&mut self) {
        if let Some(tail) = self.tail {
            let key = self.nodes[tail].key.clone();
            self.remove(&key);
            self.counters.evictions += 1;
        }
    }
}

/// LRU Cache with TTL support
pub struct LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    max_size: usize,
    ttl: Option<Duration>,
    state: Mutex<LruState<K, V>>,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_size` entries (at least one).
    /// Entries never expire when `ttl` is `None`.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            ttl,
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(max_size),
                nodes: Vec::with_capacity(max_size),
                head: None,
                tail: None,
                free: Vec::new(),
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Get an entry, refreshing its recency. Expired entries count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();

        let expired = state.entries.get(key).map(|(_, entry)| entry.is_expired(self.ttl));
        let Some(expired) = expired else {
            state.counters.misses += 1;
            return None;
        };
        if expired {
            state.remove(key);
            state.counters.expirations += 1;
            state.counters.misses += 1;
            return None;
        }

        let (idx, value) = match state.entries.get_mut(key) {
            Some((idx, entry)) => {
                entry.last_accessed = Instant::now();
                entry.access_count += 1;
                (*idx, entry.value.clone())
            }
            None => return None,
        };
        state.unlink(idx);
        state.push_to_head(idx);
        state.counters.hits += 1;
        Some(value)
    }

    /// Insert or replace an entry, evicting the least recently used one at capacity
    pub fn set(&self, key: K, value: V) {
        let mut state = self.state.lock();

        if let Some((idx, entry)) = state.entries.get_mut(&key) {
            *entry = CacheEntry::new(value);
            let idx = *idx;
            state.unlink(idx);
            state.push_to_head(idx);
            return;
        }

        if state.entries.len() >= self.max_size {
            state.evict_lru();
        }

        let idx = state.allocate_node(key.clone());
        state.entries.insert(key, (idx, CacheEntry::new(value)));
        state.push_to_head(idx);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.state.lock().remove(key)
    }

    /// Remove every entry whose key matches; returns how many were removed
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut state = self.state.lock();
        let keys: Vec<K> = state.entries.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &keys {
            state.remove(key);
        }
        keys.len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|(_, entry)| !entry.is_expired(self.ttl))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Drop all entries; counters are kept
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.nodes.clear();
        state.free.clear();
        state.head = None;
        state.tail = None;
    }

    pub fn counters(&self) -> CacheCounters {
        self.state.lock().counters
    }

    /// Remove expired entries; returns how many were dropped
    pub fn prune_expired(&self) -> usize {
        let mut state = self.state.lock();
        let ttl = self.ttl;
        let keys: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, (_, entry))| entry.is_expired(ttl))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            state.remove(key);
        }
        state.counters.expirations += keys.len() as u64;
        keys.len()
    }
}
