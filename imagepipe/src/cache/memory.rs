//! In-memory cache with byte-budget LRU eviction.

use super::stats::{CacheCounters, CacheStats};
use crate::artifact::Artifact;
use crate::key::ResourceKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Callback invoked for every entry dropped by the eviction policy.
///
/// Runs after the cache lock has been released.
pub type EvictionListener<V> = Box<dyn Fn(&ResourceKey, &V) + Send + Sync>;

/// Entry in the memory cache.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    /// Bytes charged against the budget
    size: usize,
    /// Position in the recency index
    tick: u64,
}

/// Lock-protected cache state.
///
/// `recency` maps a monotonically increasing tick to the key last touched
/// at that tick, so its first entry is always the least recently used.
#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<ResourceKey, CacheEntry<V>>,
    recency: BTreeMap<u64, ResourceKey>,
    next_tick: u64,
    current_size: usize,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            current_size: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &ResourceKey) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        self.current_size -= entry.size;
        Some(entry.value)
    }

    fn pop_lru(&mut self) -> Option<(ResourceKey, V)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        self.current_size -= entry.size;
        Some((key, entry.value))
    }
}

/// Outcome of [`MemoryCache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; `evicted` older entries were dropped to make room
    Cached { evicted: usize },
    /// The artifact alone exceeds the budget and was not stored
    Bypassed,
}

/// Byte-budget LRU cache of pipeline artifacts.
///
/// Every artifact reports its own accounted size. Inserting past the
/// budget evicts least-recently-used entries, oldest first, until the new
/// entry fits. An artifact larger than the entire budget is never stored.
///
/// All state sits behind one mutex, so an eviction pass is atomic with
/// respect to concurrent inserts. The lock is held only for map
/// bookkeeping; values are cloned out (artifacts share their storage) and
/// evicted values are dropped after the lock is released.
pub struct MemoryCache<V> {
    inner: Mutex<Inner<V>>,
    max_size_bytes: usize,
    counters: CacheCounters,
    listener: Option<EvictionListener<V>>,
}

impl<V: Artifact + Clone> MemoryCache<V> {
    /// Create a new memory cache with the given size limit.
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            max_size_bytes,
            counters: CacheCounters::default(),
            listener: None,
        }
    }

    /// Register a callback for evicted entries.
    pub fn with_eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ResourceKey, &V) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a cached artifact, marking it most recently used.
    pub fn get(&self, key: &ResourceKey) -> Option<V> {
        let value = {
            let mut guard = self.lock();
            let tick = guard.tick();
            let inner = &mut *guard;

            inner.entries.get_mut(key).map(|entry| {
                let old_tick = std::mem::replace(&mut entry.tick, tick);
                inner.recency.remove(&old_tick);
                inner.recency.insert(tick, key.clone());
                entry.value.clone()
            })
        };

        match value {
            Some(_) => self.counters.record_hit(),
            None => self.counters.record_miss(),
        }
        value
    }

    /// Get a cached artifact without touching its recency or statistics.
    pub fn peek(&self, key: &ResourceKey) -> Option<V> {
        self.lock().entries.get(key).map(|e| e.value.clone())
    }

    /// Store an artifact, evicting least-recently-used entries as needed.
    ///
    /// An existing entry for `key` is replaced.
    pub fn insert(&self, key: ResourceKey, value: V) -> InsertOutcome {
        let size = value.accounted_size();
        let mut evicted = Vec::new();

        let outcome = {
            let mut inner = self.lock();
            let replaced = inner.remove(&key);

            if size > self.max_size_bytes {
                drop(inner);
                drop(replaced);
                self.counters.record_bypass();
                return InsertOutcome::Bypassed;
            }

            while inner.current_size + size > self.max_size_bytes {
                match inner.pop_lru() {
                    Some(lru) => evicted.push(lru),
                    None => break,
                }
            }

            let tick = inner.tick();
            inner.recency.insert(tick, key.clone());
            inner.entries.insert(key, CacheEntry { value, size, tick });
            inner.current_size += size;
            drop(replaced);

            InsertOutcome::Cached {
                evicted: evicted.len(),
            }
        };

        self.counters.record_insertion();
        if !evicted.is_empty() {
            self.counters.record_evictions(evicted.len());
            if let Some(listener) = &self.listener {
                for (key, value) in &evicted {
                    listener(key, value);
                }
            }
        }

        outcome
    }

    /// Remove an entry. Not counted as an eviction.
    pub fn remove(&self, key: &ResourceKey) -> Option<V> {
        self.lock().remove(key)
    }

    /// Check if a key exists in the cache.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        let drained = {
            let mut inner = self.lock();
            std::mem::replace(&mut *inner, Inner::new())
        };
        drop(drained);
    }

    /// Get the current number of entries in the cache.
    pub fn entry_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Get the current size of the cache in bytes.
    pub fn size_bytes(&self) -> usize {
        self.lock().current_size
    }

    /// Get the maximum size of the cache in bytes.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<ResourceKey> {
        self.lock().recency.values().cloned().collect()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (entry_count, size_bytes) = {
            let inner = self.lock();
            (inner.entries.len(), inner.current_size)
        };
        self.counters.snapshot(entry_count, size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Bitmap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(n: u32) -> ResourceKey {
        ResourceKey::new(format!("https://cdn.example.com/{}.png", n))
    }

    #[test]
    fn test_memory_cache_new() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(1_000_000);
        assert_eq!(cache.max_size_bytes(), 1_000_000);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_memory_cache_insert_and_get() {
        let cache = MemoryCache::new(1_000_000);
        let data = vec![1u8, 2, 3, 4, 5];

        assert_eq!(
            cache.insert(key(1), data.clone()),
            InsertOutcome::Cached { evicted: 0 }
        );
        assert_eq!(cache.get(&key(1)), Some(data));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_memory_cache_miss() {
        let cache: MemoryCache<Vec<u8>> = MemoryCache::new(1_000_000);
        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_memory_cache_size_tracking() {
        let cache = MemoryCache::new(1_000_000);

        cache.insert(key(1), vec![0u8; 1000]);
        assert_eq!(cache.size_bytes(), 1000);

        cache.insert(key(2), vec![0u8; 2000]);
        assert_eq!(cache.size_bytes(), 3000);
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_memory_cache_replace_adjusts_size() {
        let cache = MemoryCache::new(1_000_000);

        cache.insert(key(1), vec![0u8; 1000]);
        cache.insert(key(1), vec![0u8; 400]);

        assert_eq!(cache.size_bytes(), 400);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new(1_000_000);
        cache.insert(key(1), vec![1u8, 2, 3]);

        cache.clear();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
        assert!(!cache.contains(&key(1)));
    }

    #[test]
    fn test_memory_cache_lru_eviction() {
        // Holds two and a half 1000-byte entries
        let cache = MemoryCache::new(2500);
        let data = vec![0u8; 1000];

        cache.insert(key(1), data.clone());
        cache.insert(key(2), data.clone());
        let outcome = cache.insert(key(3), data.clone());

        assert_eq!(outcome, InsertOutcome::Cached { evicted: 1 });
        assert!(!cache.contains(&key(1)), "Oldest entry should be evicted");
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert!(cache.size_bytes() <= 2500);
    }

    #[test]
    fn test_memory_cache_access_updates_lru() {
        let cache = MemoryCache::new(2500);
        let data = vec![0u8; 1000];

        cache.insert(key(1), data.clone());
        cache.insert(key(2), data.clone());
        cache.get(&key(1));
        cache.insert(key(3), data.clone());

        assert!(cache.contains(&key(1)), "Accessed entry should remain");
        assert!(!cache.contains(&key(2)), "Untouched entry should be evicted");
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn test_memory_cache_peek_does_not_touch() {
        let cache = MemoryCache::new(2500);
        let data = vec![0u8; 1000];

        cache.insert(key(1), data.clone());
        cache.insert(key(2), data.clone());
        assert!(cache.peek(&key(1)).is_some());
        cache.insert(key(3), data.clone());

        assert!(!cache.contains(&key(1)));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_memory_cache_evicts_decreasing_sizes_oldest_first() {
        let cache = MemoryCache::new(1000);

        cache.insert(key(1), vec![0u8; 500]);
        cache.insert(key(2), vec![0u8; 300]);
        cache.insert(key(3), vec![0u8; 200]);
        assert_eq!(cache.size_bytes(), 1000);

        // One more byte over budget drops only the oldest entry
        let outcome = cache.insert(key(4), vec![0u8; 100]);
        assert_eq!(outcome, InsertOutcome::Cached { evicted: 1 });
        assert_eq!(cache.keys_by_recency(), vec![key(2), key(3), key(4)]);
        assert_eq!(cache.size_bytes(), 600);
    }

    #[test]
    fn test_memory_cache_evicts_several_to_fit_large_entry() {
        let cache = MemoryCache::new(1000);
        for n in 1..=4 {
            cache.insert(key(n), vec![0u8; 250]);
        }

        let outcome = cache.insert(key(5), vec![0u8; 700]);
        assert_eq!(outcome, InsertOutcome::Cached { evicted: 3 });
        assert_eq!(cache.keys_by_recency(), vec![key(4), key(5)]);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_memory_cache_bypasses_oversized_entry() {
        let cache = MemoryCache::new(1000);
        cache.insert(key(1), vec![0u8; 400]);

        let outcome = cache.insert(key(2), vec![0u8; 1001]);
        assert_eq!(outcome, InsertOutcome::Bypassed);
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(1)), "Bypass must not evict anything");
        assert_eq!(cache.stats().bypasses, 1);
    }

    #[test]
    fn test_memory_cache_entry_exactly_at_budget_is_cached() {
        let cache = MemoryCache::new(1000);
        assert_eq!(
            cache.insert(key(1), vec![0u8; 1000]),
            InsertOutcome::Cached { evicted: 0 }
        );
    }

    #[test]
    fn test_memory_cache_remove_is_not_an_eviction() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evicted);
        let cache = MemoryCache::new(1000)
            .with_eviction_listener(move |_, _: &Vec<u8>| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        cache.insert(key(1), vec![0u8; 10]);
        assert_eq!(cache.remove(&key(1)), Some(vec![0u8; 10]));
        assert_eq!(evicted.load(Ordering::SeqCst), 0);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_memory_cache_eviction_listener_sees_dropped_entries() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cache = MemoryCache::new(100).with_eviction_listener(move |k, v: &Vec<u8>| {
            sink.lock().unwrap().push((k.clone(), v.len()));
        });

        cache.insert(key(1), vec![0u8; 60]);
        cache.insert(key(2), vec![0u8; 60]);

        assert_eq!(*seen.lock().unwrap(), vec![(key(1), 60)]);
    }

    #[test]
    fn test_evicted_bitmap_released_only_after_last_owner() {
        let cache = MemoryCache::new(4 * 4 * 4);
        let bitmap = Bitmap::new(image::RgbaImage::new(4, 4));
        cache.insert(key(1), bitmap.clone());

        let in_use = cache.get(&key(1)).unwrap();
        assert_eq!(bitmap.owner_count(), 3);

        cache.insert(key(2), Bitmap::new(image::RgbaImage::new(4, 4)));
        assert!(!cache.contains(&key(1)));
        assert_eq!(bitmap.owner_count(), 2, "Renderer copy still alive");

        drop(in_use);
        assert_eq!(bitmap.owner_count(), 1);
    }

    #[test]
    fn test_concurrent_inserts_respect_budget() {
        let cache = Arc::new(MemoryCache::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..200 {
                        cache.insert(key(t * 1000 + n), vec![0u8; 300]);
                        cache.get(&key(t * 1000 + n / 2));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.size_bytes() <= 10_000);
        assert_eq!(cache.size_bytes(), cache.entry_count() * 300);
        assert_eq!(cache.keys_by_recency().len(), cache.entry_count());
    }
}
