//! LRU cache for validation verdicts
//!
//! Configuration sets tend to repeat values (the same address under many
//! keys), so verdicts are cached per validator kind, variant and value.

use super::Verdict;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key for a verdict
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: String,
    variant: String,
    value: Vec<u8>,
}

/// LRU cache of validation verdicts
pub struct VerdictCache {
    cache: LruCache<CacheKey, Verdict>,
}

impl VerdictCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        VerdictCache {
            cache: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, kind: &str, variant: &str, value: &[u8]) -> Option<Verdict> {
        let key = CacheKey {
            kind: kind.to_string(),
            variant: variant.to_string(),
            value: value.to_vec(),
        };
        self.cache.get(&key).cloned()
    }

    pub fn put(&mut self, kind: &str, variant: &str, value: &[u8], verdict: Verdict) {
        let key = CacheKey {
            kind: kind.to_string(),
            variant: variant.to_string(),
            value: value.to_vec(),
        };
        self.cache.put(key, verdict);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> VerdictCache {
        VerdictCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_cache_basic() {
        let mut cache = cache(10);
        assert!(cache.get("ipaddr", "ipv4", b"1.2.3.4").is_none());

        cache.put("ipaddr", "ipv4", b"1.2.3.4", Verdict::Valid);
        assert_eq!(cache.get("ipaddr", "ipv4", b"1.2.3.4"), Some(Verdict::Valid));
        assert!(cache.get("ipaddr", "ipv6", b"1.2.3.4").is_none());
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = cache(2);
        cache.put("k", "", b"a", Verdict::Valid);
        cache.put("k", "", b"b", Verdict::NoOpinion);
        cache.get("k", "", b"a");
        cache.put("k", "", b"c", Verdict::Invalid("c".into()));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("k", "", b"b").is_none());
        assert!(cache.get("k", "", b"a").is_some());
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = cache(4);
        cache.put("k", "", b"a", Verdict::Valid);
        cache.clear();
        assert!(cache.is_empty());
    }
}
