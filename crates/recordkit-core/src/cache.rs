//! Query result caching.
//!
//! A [`CacheKey`] fingerprints one execution: db key, tag, SQL text and each
//! parameter, in that order. [`Cache`] is the storage boundary; [`MemoryCache`]
//! is the bundled LRU implementation.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Type-erased cached result. Executors downcast it back to their output type.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

const DEFAULT_MULTIPLIER: u64 = 37;
const DEFAULT_HASHCODE: u64 = 17;

/// Ordered digest over the parts of a query fingerprint.
///
/// Two keys are equal iff they received the same parts in the same order. The
/// running hash, checksum and count make most unequal comparisons cheap.
#[derive(Clone)]
pub struct CacheKey {
    hashcode: u64,
    checksum: u64,
    count: u64,
    parts: Vec<String>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            parts: Vec::new(),
        }
    }

    /// Append one part, using its display form.
    pub fn update(&mut self, part: impl fmt::Display) {
        let part = part.to_string();
        let mut hasher = DefaultHasher::new();
        part.hash(&mut hasher);
        let mut base = hasher.finish();

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        base = base.wrapping_mul(self.count);
        self.hashcode = DEFAULT_MULTIPLIER
            .wrapping_mul(self.hashcode)
            .wrapping_add(base);
        self.parts.push(part);
    }

    /// Number of parts fed so far.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hashcode.hash(state);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for part in &self.parts {
            write!(f, ":{}", part)?;
        }
        Ok(())
    }
}

/// Storage for cached query results.
pub trait Cache: Send + Sync {
    /// Identifier used in log output.
    fn id(&self) -> &str;

    fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    fn put(&self, key: CacheKey, value: CachedValue);

    fn remove(&self, key: &CacheKey) -> Option<CachedValue>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    inserted: Instant,
    last_used: Instant,
    hit_count: u64,
}

/// LRU-style in-memory cache.
///
/// When the cache exceeds `max_size`, the least-recently-used entry is evicted.
/// Entries older than the optional TTL are dropped on access.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use recordkit_core::cache::{Cache, CacheKey, MemoryCache};
///
/// let cache = MemoryCache::new("rows", 100);
/// let mut key = CacheKey::new();
/// key.update("db1");
/// key.update("SELECT 1");
///
/// cache.put(key.clone(), Arc::new(1_u64));
/// let hit = cache.get(&key).unwrap();
/// assert_eq!(hit.downcast_ref::<u64>(), Some(&1));
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    id: String,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    max_size: usize,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create a new cache with the given maximum number of entries.
    pub fn new(id: impl Into<String>, max_size: usize) -> Self {
        Self {
            id: id.into(),
            entries: Mutex::new(HashMap::with_capacity(max_size.min(256))),
            max_size: max_size.max(1),
            ttl: None,
        }
    }

    /// Expire entries after `ttl`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// How many times the entry for `key` has been served.
    pub fn hit_count(&self, key: &CacheKey) -> u64 {
        self.lock().get(key).map_or(0, |e| e.hit_count)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn evict_lru(&self, entries: &mut HashMap<CacheKey, CacheEntry>) {
        let lru_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = lru_key {
            if let Some(entry) = entries.remove(&key) {
                tracing::debug!(
                    cache = %self.id,
                    hits = entry.hit_count,
                    "Evicted least recently used entry"
                );
            }
        }
    }
}

impl Cache for MemoryCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.lock();
        let expired = match (entries.get(key), self.ttl) {
            (Some(entry), Some(ttl)) => entry.inserted.elapsed() > ttl,
            _ => false,
        };
        if expired {
            entries.remove(key);
            tracing::debug!(cache = %self.id, "Cache entry expired");
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.last_used = Instant::now();
        entry.hit_count += 1;
        Some(Arc::clone(&entry.value))
    }

    fn put(&self, key: CacheKey, value: CachedValue) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            self.evict_lru(&mut entries);
        }
        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted: now,
                last_used: now,
                hit_count: 0,
            },
        );
    }

    fn remove(&self, key: &CacheKey) -> Option<CachedValue> {
        self.lock().remove(key).map(|e| e.value)
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> CacheKey {
        let mut k = CacheKey::new();
        for p in parts {
            k.update(p);
        }
        k
    }

    #[test]
    fn test_equal_parts_equal_keys() {
        assert_eq!(key(&["db", "null", "SELECT ?", "1"]), key(&["db", "null", "SELECT ?", "1"]));
    }

    #[test]
    fn test_one_part_differs() {
        assert_ne!(key(&["db", "null", "SELECT ?", "1"]), key(&["db", "null", "SELECT ?", "2"]));
        assert_ne!(key(&["a", "b"]), key(&["b", "a"]));
        assert_ne!(key(&["a"]), key(&["a", ""]));
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = MemoryCache::new("t", 10);
        let k = key(&["x"]);
        assert!(cache.get(&k).is_none());

        cache.put(k.clone(), Arc::new(String::from("v")));
        let hit = cache.get(&k).unwrap();
        assert_eq!(hit.downcast_ref::<String>().map(String::as_str), Some("v"));
        assert_eq!(cache.hit_count(&k), 1);
    }

    #[test]
    fn test_eviction_is_lru() {
        let cache = MemoryCache::new("t", 2);
        let (k1, k2, k3) = (key(&["1"]), key(&["2"]), key(&["3"]));
        cache.put(k1.clone(), Arc::new(1_u8));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(k2.clone(), Arc::new(2_u8));
        std::thread::sleep(Duration::from_millis(2));

        // touch k1 so k2 becomes least recently used
        assert!(cache.get(&k1).is_some());
        cache.put(k3.clone(), Arc::new(3_u8));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MemoryCache::new("t", 4).with_ttl(Duration::from_millis(1));
        let k = key(&["ttl"]);
        cache.put(k.clone(), Arc::new(()));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = MemoryCache::new("t", 4);
        cache.put(key(&["a"]), Arc::new(1_i32));
        cache.put(key(&["b"]), Arc::new(2_i32));
        assert!(cache.remove(&key(&["a"])).is_some());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
