// Response cache
//
// LRU + TTL, keyed by (tool, normalized payload, cache epoch). Epoch keying
// means an index run invalidates everything without a flush: stale entries
// simply stop being addressable and age out of the LRU.

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const CACHE_CAPACITY: usize = 256;
pub const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Hit,
    Miss,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Hit => "hit",
            CacheMode::Miss => "miss",
        }
    }
}

struct Entry {
    value: Value,
    inserted: Instant,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY, CACHE_TTL)
    }
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("capacity is nonzero"),
            )),
            ttl,
        }
    }

    pub fn key(tool: &str, payload: &Value, epoch: i64) -> String {
        format!("{tool}:{epoch}:{payload}")
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock");
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: Value) {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.put(
            key,
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epoch_partitions_keys() {
        let payload = json!({"query": "auth"});
        let key_a = ResponseCache::key("search_symbols", &payload, 1);
        let key_b = ResponseCache::key("search_symbols", &payload, 2);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = ResponseCache::new(8, Duration::from_millis(0));
        cache.put("k".into(), json!(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn round_trip() {
        let cache = ResponseCache::default();
        cache.put("k".into(), json!({"a": 1}));
        assert_eq!(cache.get("k").unwrap(), json!({"a": 1}));
        assert!(cache.get("missing").is_none());
    }
}
