use std::time::Duration;

use chrono::{DateTime, Utc};
use metaforged_common::{Result, SharedClock};
use metaforged_db::models::{CacheEntry, CacheStats};
use metaforged_db::pool::{checkpoint, get_conn, init_memory_pool, init_pool, DbPool};
use metaforged_db::queries::cache_entries;
use tracing::{debug, warn};

use super::CacheStore;

/// SQLite-backed store shared by every process that opens the same file.
pub struct SqliteStore {
    pool: DbPool,
    clock: SharedClock,
}

impl SqliteStore {
    pub fn open(path: &str, pool_size: u32, clock: SharedClock) -> Result<Self> {
        let pool = init_pool(path, pool_size)?;
        debug!(path, pool_size, "Opened cache database");
        Ok(Self { pool, clock })
    }

    /// A private in-memory database with the same schema.
    pub fn in_memory(clock: SharedClock) -> Result<Self> {
        Ok(Self {
            pool: init_memory_pool()?,
            clock,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn lookup(&self, key: &str, checksum: Option<&str>) -> Result<Option<String>> {
        let conn = get_conn(&self.pool)?;
        let Some(entry) = cache_entries::get(&conn, key)? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if entry.is_expired(now) {
            debug!(key, "Cache entry expired, reaping");
            cache_entries::delete_if_expired(&conn, key, now)?;
            return Ok(None);
        }
        if !entry.matches_checksum(checksum) {
            debug!(key, "Cache checksum mismatch");
            return Ok(None);
        }
        Ok(Some(entry.payload))
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str, checksum: Option<&str>) -> Option<String> {
        match self.lookup(key, checksum) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, payload: &str, ttl: Duration, checksum: Option<&str>) {
        let now = self.clock.now();
        let entry = CacheEntry::new(key, payload, checksum, now, expiry(now, ttl));
        let result = get_conn(&self.pool).and_then(|conn| cache_entries::upsert(&conn, &entry));
        if let Err(e) = result {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    fn remove(&self, key: &str) -> bool {
        match get_conn(&self.pool).and_then(|conn| cache_entries::delete(&conn, key)) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        match get_conn(&self.pool).and_then(|conn| cache_entries::delete_expired(&conn, now)) {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Cache purge failed");
                0
            }
        }
    }

    fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        get_conn(&self.pool)
            .and_then(|conn| cache_entries::stats(&conn, now))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Cache stats unavailable");
                CacheStats::default()
            })
    }

    fn flush(&self) {
        if let Err(e) = checkpoint(&self.pool) {
            warn!(error = %e, "Cache checkpoint failed");
        }
    }
}

/// `now + ttl`, saturating instead of overflowing on absurd TTLs.
pub(super) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
