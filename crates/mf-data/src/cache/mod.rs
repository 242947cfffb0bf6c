//! Memoization of derived snapshots

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::Mutex;
use indexmap::IndexMap;

use mf_core::Feature;

use crate::analysis::FieldAnalysis;

// Fixed seeds keep fingerprints comparable across cache instances.
const FINGERPRINT_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Content fingerprint of a feature collection.
///
/// Equal collections (same features, same order) always produce the same
/// fingerprint.
pub fn fingerprint(features: &[Feature]) -> u64 {
    let [k0, k1, k2, k3] = FINGERPRINT_SEEDS;
    ahash::RandomState::with_seeds(k0, k1, k2, k3).hash_one(features)
}

/// Small LRU cache of immutable snapshots.
///
/// Values are handed out as `Arc`s so every holder sees the same snapshot
/// and nothing is ever mutated in place.
pub struct SnapshotCache<K, V> {
    /// Entries in access order, most recent last
    entries: Mutex<IndexMap<K, Arc<V>>>,
    /// Maximum number of entries to keep
    max_entries: usize,
}

/// Field analyses keyed by collection fingerprint
pub type AnalysisCache = SnapshotCache<u64, FieldAnalysis>;

impl<K, V> SnapshotCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    /// Create a new cache holding at most `max_entries` snapshots
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Get a snapshot, marking it as recently used
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.lock();
        let value = entries.shift_remove(key)?;
        entries.insert(key.clone(), value.clone());
        Some(value)
    }

    /// Store a snapshot, evicting the least recently used one when full
    pub fn put(&self, key: K, value: Arc<V>) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        if entries.len() >= self.max_entries {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value);
    }

    /// Cached snapshot for `key`, computing it with `compute` on a miss.
    ///
    /// The lock is not held while computing.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            tracing::debug!("Snapshot cache hit for {:?}", key);
            return value;
        }

        tracing::debug!("Snapshot cache miss for {:?}", key);
        let value = Arc::new(compute());
        self.put(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use std::cell::Cell;

    fn features() -> Vec<Feature> {
        vec![
            Feature::new("1").with_property("happening", "flood"),
            Feature::new("2").with_property("happening", "fire"),
        ]
    }

    #[test]
    fn test_fingerprint_follows_content() {
        let a = features();
        let b = features();
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let edited = vec![a[0].with_value("happening", "storm"), a[1].clone()];
        assert_ne!(fingerprint(&a), fingerprint(&edited));

        let reordered = vec![a[1].clone(), a[0].clone()];
        assert_ne!(fingerprint(&a), fingerprint(&reordered));
    }

    #[test]
    fn test_analysis_is_computed_once_per_fingerprint() {
        let cache = AnalysisCache::new(4);
        let data = features();
        let calls = Cell::new(0);

        let first = cache.get_or_insert_with(fingerprint(&data), || {
            calls.set(calls.get() + 1);
            analyze(&data)
        });
        let second = cache.get_or_insert_with(fingerprint(&data), || {
            calls.set(calls.get() + 1);
            analyze(&data)
        });

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache: SnapshotCache<u32, &str> = SnapshotCache::new(2);
        cache.put(1, Arc::new("one"));
        cache.put(2, Arc::new("two"));
        assert!(cache.get(&1).is_some());

        cache.put(3, Arc::new("three"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&2).is_none());
        assert!(cache.get(&1).is_some());
        assert!(cache.get(&3).is_some());
    }
}
