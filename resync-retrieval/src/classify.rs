//! Query-intent classification and its LRU/TTL cache (spec §4.4).

use lru::LruCache;
use parking_lot::Mutex;
use resync_core::entities::contains_tws_identifier;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    ExactMatch,
    Semantic,
    Mixed,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalWeights {
    pub vector: f32,
    pub bm25: f32,
}

impl QueryClass {
    #[must_use]
    pub fn weights(self, defaults: RetrievalWeights) -> RetrievalWeights {
        match self {
            Self::ExactMatch => RetrievalWeights { vector: 0.2, bm25: 0.8 },
            Self::Semantic => RetrievalWeights { vector: 0.8, bm25: 0.2 },
            Self::Mixed => RetrievalWeights { vector: 0.5, bm25: 0.5 },
            Self::Default => defaults,
        }
    }
}

/// Heuristic used at §8 scenario 1/2: presence of a TWS identifier pattern
/// drives `ExactMatch`/`Mixed`; natural-language phrasing without one is
/// `Semantic`.
#[must_use]
pub fn classify_query(query: &str) -> QueryClass {
    let has_identifier = contains_tws_identifier(query);
    let word_count = query.split_whitespace().count();
    match (has_identifier, word_count) {
        (true, n) if n <= 2 => QueryClass::ExactMatch,
        (true, _) => QueryClass::Mixed,
        (false, _) => QueryClass::Semantic,
    }
}

fn normalize(query: &str) -> String {
    query.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Entry {
    class: QueryClass,
    cached_at: Instant,
}

/// LRU cache of classification results keyed by normalized query, with a
/// per-entry TTL (spec §4.4, §5: "concurrent puts may evict under
/// contention — acceptable").
pub struct QueryClassificationCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl QueryClassificationCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns `(class, was_cache_hit)`. A cached entry older than the TTL
    /// is treated as a miss and reclassified.
    #[must_use]
    pub fn get_or_classify(&self, query: &str) -> (QueryClass, bool) {
        let key = normalize(query);
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(&key) {
            if entry.cached_at.elapsed() < self.ttl {
                return (entry.class, true);
            }
        }
        let class = classify_query(query);
        cache.put(key, Entry { class, cached_at: Instant::now() });
        (class, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_for_bare_identifier() {
        assert_eq!(classify_query("AWSBH001"), QueryClass::ExactMatch);
    }

    #[test]
    fn semantic_for_natural_language() {
        assert_eq!(
            classify_query("how do I recover a failed scheduled job"),
            QueryClass::Semantic
        );
    }

    #[test]
    fn mixed_when_identifier_appears_in_a_sentence() {
        assert_eq!(
            classify_query("why does AWSBH001 keep failing with RC=8 every night"),
            QueryClass::Mixed
        );
    }

    #[test]
    fn cache_hit_on_repeated_normalized_query() {
        let cache = QueryClassificationCache::new(10, Duration::from_secs(60));
        let (_, first_hit) = cache.get_or_classify("  AWSBH001  ");
        let (_, second_hit) = cache.get_or_classify("awsbh001");
        assert!(!first_hit);
        assert!(second_hit);
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = QueryClassificationCache::new(10, Duration::from_millis(1));
        let (_, first_hit) = cache.get_or_classify("AWSBH001");
        std::thread::sleep(Duration::from_millis(5));
        let (_, second_hit) = cache.get_or_classify("AWSBH001");
        assert!(!first_hit);
        assert!(!second_hit);
    }
}
