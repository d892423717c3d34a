// Bounded in-memory cache of parsed recordings

use crate::core::format::{ChannelData, Metadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A parsed recording. Shared read-only between the cache and request handlers.
#[derive(Debug)]
pub struct Dataset {
    pub metadata: Metadata,
    pub data: ChannelData,
}

struct CacheEntry {
    dataset: Arc<Dataset>,
    // Logical access time; updated under the shared lock on hits.
    last_access: AtomicU64,
}

pub struct DatasetCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    clock: AtomicU64,
}

impl DatasetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &str) -> Option<Arc<Dataset>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(id)?;
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.dataset))
    }

    /// Inserts or replaces an entry, then evicts at most one least-recently-used entry.
    pub fn set(&self, id: &str, metadata: Metadata, data: ChannelData) -> Arc<Dataset> {
        let dataset = Arc::new(Dataset { metadata, data });
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            id.to_string(),
            CacheEntry {
                dataset: Arc::clone(&dataset),
                last_access: AtomicU64::new(self.tick()),
            },
        );

        if entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                debug!("evicting dataset {} from cache", key);
                entries.remove(&key);
            }
        }
        dataset
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(id).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(cache: &DatasetCache, id: &str) {
        let meta = Metadata {
            station: id.to_string(),
            ..Default::default()
        };
        cache.set(id, meta, ChannelData::default());
    }

    #[test]
    fn test_evicts_first_inserted() {
        let cache = DatasetCache::new(3);
        for id in ["a", "b", "c", "d"] {
            put(&cache, id);
        }
        assert_eq!(cache.size(), 3);
        assert!(cache.get("a").is_none());
        for id in ["b", "c", "d"] {
            assert_eq!(cache.get(id).unwrap().metadata.station, id);
        }
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = DatasetCache::new(2);
        put(&cache, "a");
        put(&cache, "b");
        assert!(cache.get("a").is_some());
        put(&cache, "c");
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_overwrite_keeps_size() {
        let cache = DatasetCache::new(2);
        put(&cache, "a");
        put(&cache, "a");
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = DatasetCache::new(4);
        put(&cache, "a");
        put(&cache, "b");
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.size(), 1);
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(DatasetCache::new(8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("{}", (t * 100 + i) % 16);
                        if cache.get(&id).is_none() {
                            put(&cache, &id);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.size() <= 8);
    }
}
