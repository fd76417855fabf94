use std::time::Duration;

use dashmap::DashMap;
use metaforged_common::SharedClock;
use metaforged_db::models::{CacheEntry, CacheStats};
use tracing::debug;

use super::sqlite::expiry;
use super::CacheStore;

/// Process-local store. Contents are lost when it is dropped.
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    clock: SharedClock,
}

impl MemoryStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str, checksum: Option<&str>) -> Option<String> {
        let now = self.clock.now();
        let (expired, payload) = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(now) {
                (true, None)
            } else if entry.matches_checksum(checksum) {
                (false, Some(entry.payload.clone()))
            } else {
                debug!(key, "Cache checksum mismatch");
                (false, None)
            }
        };

        if expired {
            debug!(key, "Cache entry expired, reaping");
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        payload
    }

    fn set(&self, key: &str, payload: &str, ttl: Duration, checksum: Option<&str>) {
        let now = self.clock.now();
        self.entries.insert(
            key.to_string(),
            CacheEntry::new(key, payload, checksum, now, expiry(now, ttl)),
        );
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let expired = self.entries.iter().filter(|e| e.is_expired(now)).count();
        CacheStats {
            entries: self.entries.len() as u64,
            expired: expired as u64,
        }
    }
}
