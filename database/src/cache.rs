use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Size-bounded least-recently-used cache, safe to share between threads
pub struct Cache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    /// A zero capacity still keeps a single entry
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().pop(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type-erased handle the database uses to invalidate cached rows after a commit
pub trait CacheEviction: Send + Sync {
    fn evict(&self, key: &[u8]);
    fn evict_all(&self);
}

impl<V: Clone + Send> CacheEviction for Cache<Vec<u8>, V> {
    fn evict(&self, key: &[u8]) {
        self.inner.lock().pop(key);
    }

    fn evict_all(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_eviction() {
        let c = Cache::new(2);
        c.insert(1u32, "one");
        c.insert(2u32, "two");
        assert_eq!(c.len(), 2);
        // Touch 1 so that 2 becomes the eviction candidate
        assert_eq!(c.get(&1u32), Some("one"));
        c.insert(3u32, "three");
        assert_eq!(c.len(), 2);
        assert!(c.contains_key(&1));
        assert!(!c.contains_key(&2));
        assert_eq!(c.remove(&3), Some("three"));
    }

    #[test]
    fn test_zero_capacity() {
        let c = Cache::new(0);
        c.insert(1u8, 1u8);
        c.insert(2u8, 2u8);
        assert_eq!(c.len(), 1);
    }
}
