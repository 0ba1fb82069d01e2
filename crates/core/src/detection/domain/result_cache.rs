use std::collections::{HashMap, VecDeque};

use crate::shared::constants::{CACHE_KEY_BUCKET_MS, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_MS};
use crate::shared::frame::Frame;

use super::detected_face::DetectedFace;

/// Identity of a sampled frame: source dimensions plus a coarse
/// timestamp bucket. Frames sampled within the same bucket share results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub width: u32,
    pub height: u32,
    pub bucket: u64,
}

impl CacheKey {
    pub fn new(width: u32, height: u32, timestamp_ms: f64) -> Self {
        let bucket = if timestamp_ms.is_finite() && timestamp_ms > 0.0 {
            (timestamp_ms / CACHE_KEY_BUCKET_MS).floor() as u64
        } else {
            0
        };
        Self {
            width,
            height,
            bucket,
        }
    }

    pub fn for_frame(frame: &Frame, timestamp_ms: f64) -> Self {
        Self::new(frame.width(), frame.height(), timestamp_ms)
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    faces: Vec<DetectedFace>,
    stored_at_ms: f64,
    generation: u64,
}

/// Short-TTL memo of detector output.
///
/// Entries expire purely by age. Capacity is enforced oldest-first by
/// insertion order; the order queue carries a generation stamp per slot so
/// overwrites and expiries leave stale slots behind instead of requiring a
/// linear removal. Stale slots are skipped on eviction and compacted away
/// once the queue outgrows twice the capacity.
pub struct ResultCache {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<(CacheKey, u64)>,
    next_generation: u64,
    ttl_ms: f64,
    capacity: usize,
}

impl ResultCache {
    pub fn new(ttl_ms: u64, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_generation: 0,
            ttl_ms: ttl_ms as f64,
            capacity: capacity.max(1),
        }
    }

    /// Returns the stored faces if the entry exists and is younger than the TTL.
    pub fn lookup(&mut self, key: &CacheKey, now_ms: f64) -> Option<Vec<DetectedFace>> {
        let entry = self.entries.get(key)?;
        if now_ms - entry.stored_at_ms < self.ttl_ms {
            return Some(entry.faces.clone());
        }
        self.entries.remove(key);
        None
    }

    /// Stores `faces` under `key`, replacing any previous entry, then evicts
    /// the oldest entries while over capacity.
    pub fn store(&mut self, key: CacheKey, faces: Vec<DetectedFace>, now_ms: f64) {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.entries.insert(
            key,
            CacheEntry {
                faces,
                stored_at_ms: now_ms,
                generation,
            },
        );
        self.order.push_back((key, generation));

        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
        if self.order.len() > self.capacity * 2 {
            self.compact();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn evict_oldest(&mut self) {
        while let Some((key, generation)) = self.order.pop_front() {
            if self.is_live(&key, generation) {
                self.entries.remove(&key);
                return;
            }
        }
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.order.retain(|(key, generation)| {
            entries
                .get(key)
                .is_some_and(|e| e.generation == *generation)
        });
    }

    fn is_live(&self, key: &CacheKey, generation: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.generation == generation)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_MS, DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detected_face::BoundingBox;
    use rstest::rstest;

    fn face(x: f64) -> DetectedFace {
        DetectedFace::new(BoundingBox::new(x, 0.1, 0.1, 0.1), 0.9)
    }

    fn key(bucket: u64) -> CacheKey {
        CacheKey {
            width: 640,
            height: 480,
            bucket,
        }
    }

    #[test]
    fn test_lookup_right_after_store_hits() {
        let mut cache = ResultCache::default();
        cache.store(key(1), vec![face(0.2)], 1000.0);
        assert_eq!(cache.lookup(&key(1), 1000.0), Some(vec![face(0.2)]));
    }

    #[test]
    fn test_lookup_unknown_key_misses() {
        let mut cache = ResultCache::default();
        cache.store(key(1), vec![face(0.2)], 1000.0);
        assert!(cache.lookup(&key(2), 1000.0).is_none());
    }

    #[rstest]
    #[case::just_before_ttl(1099.0, true)]
    #[case::at_ttl(1100.0, false)]
    #[case::well_after_ttl(5000.0, false)]
    fn test_lookup_respects_ttl(#[case] now: f64, #[case] hit: bool) {
        let mut cache = ResultCache::new(100, 50);
        cache.store(key(1), vec![face(0.2)], 1000.0);
        assert_eq!(cache.lookup(&key(1), now).is_some(), hit);
    }

    #[test]
    fn test_expired_lookup_removes_entry() {
        let mut cache = ResultCache::new(100, 50);
        cache.store(key(1), vec![face(0.2)], 0.0);
        assert!(cache.lookup(&key(1), 150.0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let mut cache = ResultCache::new(0, 50);
        cache.store(key(1), vec![face(0.2)], 0.0);
        assert!(cache.lookup(&key(1), 0.0).is_none());
    }

    #[test]
    fn test_store_overwrites_same_key() {
        let mut cache = ResultCache::default();
        cache.store(key(1), vec![face(0.2)], 0.0);
        cache.store(key(1), vec![face(0.5), face(0.6)], 10.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&key(1), 10.0).unwrap().len(), 2);
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest() {
        let mut cache = ResultCache::new(100, 50);
        for i in 0..51 {
            cache.store(key(i), vec![face(0.1)], 0.0);
        }
        assert_eq!(cache.len(), 50);
        assert!(!cache.contains(&key(0)));
        for i in 1..51 {
            assert!(cache.contains(&key(i)), "key {i} should be present");
        }
    }

    #[test]
    fn test_overwritten_key_counts_as_newest() {
        let mut cache = ResultCache::new(100, 3);
        cache.store(key(0), vec![], 0.0);
        cache.store(key(1), vec![], 0.0);
        cache.store(key(2), vec![], 0.0);
        cache.store(key(0), vec![face(0.3)], 1.0);
        cache.store(key(3), vec![], 2.0);

        assert!(cache.contains(&key(0)));
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn test_capacity_one_keeps_just_inserted_entry() {
        let mut cache = ResultCache::new(100, 1);
        cache.store(key(0), vec![], 0.0);
        cache.store(key(1), vec![face(0.4)], 0.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(1)));
    }

    #[test]
    fn test_repeated_overwrites_keep_order_queue_bounded() {
        let mut cache = ResultCache::new(100, 4);
        for i in 0..1000 {
            cache.store(key(i % 2), vec![], i as f64);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.order.len() <= 8);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = ResultCache::default();
        cache.store(key(0), vec![face(0.1)], 0.0);
        cache.store(key(1), vec![face(0.1)], 0.0);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup(&key(0), 0.0).is_none());
    }

    #[test]
    fn test_key_buckets_timestamps() {
        assert_eq!(CacheKey::new(640, 480, 1000.0), CacheKey::new(640, 480, 1099.9));
        assert_ne!(CacheKey::new(640, 480, 1000.0), CacheKey::new(640, 480, 1100.0));
        assert_ne!(CacheKey::new(640, 480, 1000.0), CacheKey::new(320, 240, 1000.0));
    }

    #[test]
    fn test_key_for_negative_timestamp_uses_first_bucket() {
        assert_eq!(CacheKey::new(1, 1, -50.0).bucket, 0);
        assert_eq!(CacheKey::new(1, 1, f64::NAN).bucket, 0);
    }
}
