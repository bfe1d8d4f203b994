//! Answer-level cache keyed by the question and the set of retrieved chunks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    pub inserted_at: Instant,
}

/// Stable key for `(question, chunk_ids)`: the blake3 hex digest of
/// `{"chunk_ids": [sorted ids], "question": question}` as compact JSON.
/// The order the ids arrive in does not matter.
pub fn cache_key(question: &str, chunk_ids: &[String]) -> String {
    let mut ids: Vec<&str> = chunk_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    // serde_json maps keep keys sorted, so this serialization is canonical.
    let canonical = serde_json::json!({ "chunk_ids": ids, "question": question }).to_string();
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

pub struct AnswerCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedAnswer>>,
}

impl AnswerCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedAnswer>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh(&self, entry: &CachedAnswer, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) < self.ttl
    }

    pub fn get(&self, question: &str, chunk_ids: &[String]) -> Option<CachedAnswer> {
        self.get_at(question, chunk_ids, Instant::now())
    }

    /// Lookup as of `now`. Expired entries read as absent but are left in
    /// place; removal happens on the next `put`.
    pub fn get_at(&self, question: &str, chunk_ids: &[String], now: Instant) -> Option<CachedAnswer> {
        let key = cache_key(question, chunk_ids);
        let entries = self.lock();
        entries.get(&key).filter(|e| self.fresh(e, now)).cloned()
    }

    pub fn put(&self, question: &str, chunk_ids: &[String], answer: &str, sources: &[String]) {
        self.put_at(question, chunk_ids, answer, sources, Instant::now())
    }

    pub fn put_at(&self, question: &str, chunk_ids: &[String], answer: &str, sources: &[String], now: Instant) {
        let key = cache_key(question, chunk_ids);
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| self.fresh(e, now));
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "evicted expired answers");
        }
        entries.insert(
            key,
            CachedAnswer { answer: answer.to_string(), sources: sources.to_vec(), inserted_at: now },
        );
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_ignores_chunk_order() {
        assert_eq!(cache_key("q", &ids(&["b", "a", "c"])), cache_key("q", &ids(&["c", "b", "a"])));
        assert_ne!(cache_key("q", &ids(&["a"])), cache_key("q2", &ids(&["a"])));
        assert_ne!(cache_key("q", &ids(&["a"])), cache_key("q", &ids(&["a", "b"])));
        assert_eq!(cache_key("q", &[]).len(), 64);
    }

    #[test]
    fn get_after_put_returns_answer() {
        let cache = AnswerCache::new(Duration::from_secs(60));
        assert!(cache.get("q", &ids(&["a"])).is_none());
        cache.put("q", &ids(&["a", "b"]), "yes", &ids(&["Manual - Page 2"]));
        let hit = cache.get("q", &ids(&["b", "a"])).unwrap();
        assert_eq!(hit.answer, "yes");
        assert_eq!(hit.sources, ids(&["Manual - Page 2"]));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = AnswerCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.put_at("q", &ids(&["a"]), "yes", &[], t0);
        assert!(cache.get_at("q", &ids(&["a"]), t0 + Duration::from_secs(9)).is_some());
        assert!(cache.get_at("q", &ids(&["a"]), t0 + Duration::from_secs(10)).is_none());
        // Reads never evict.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites_and_evicts_expired() {
        let cache = AnswerCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.put_at("old", &ids(&["a"]), "stale", &[], t0);
        cache.put_at("q", &ids(&["a"]), "first", &[], t0);
        cache.put_at("q", &ids(&["a"]), "second", &[], t0 + Duration::from_secs(5));
        assert_eq!(cache.len(), 2);

        cache.put_at("new", &ids(&["z"]), "fresh", &[], t0 + Duration::from_secs(12));
        assert_eq!(cache.len(), 2, "old expired; q refreshed at t0+5 survives");
        let hit = cache.get_at("q", &ids(&["a"]), t0 + Duration::from_secs(12)).unwrap();
        assert_eq!(hit.answer, "second");
    }
}
