//! Durable key/value cache with per-entry expiry and optional checksums.
//!
//! The [`CacheStore`] trait is the storage seam; [`SqliteStore`] persists
//! across restarts and [`MemoryStore`] is an ephemeral drop-in used by tests
//! and one-shot commands. [`Cache`] is the typed façade the rest of the crate
//! talks to: it serializes values to JSON text and turns every storage or
//! decoding failure into a plain miss.

mod key;
mod memory;
mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use metaforged_common::SharedClock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub use key::CacheKey;
pub use memory::MemoryStore;
pub use metaforged_db::models::CacheStats;
pub use sqlite::SqliteStore;

use crate::config::CacheConfig;

/// Storage backend for cached payloads.
///
/// Implementations never return errors: a failing backend logs and behaves as
/// if the entry were absent, so callers simply recompute.
pub trait CacheStore: Send + Sync {
    /// Payload stored under `key`, or `None` when the key is absent, the entry
    /// has expired, or `checksum` is given and differs from the stored one.
    fn get(&self, key: &str, checksum: Option<&str>) -> Option<String>;

    /// Store `payload` under `key`, replacing any previous entry.
    fn set(&self, key: &str, payload: &str, ttl: Duration, checksum: Option<&str>);

    /// Drop a single entry. Returns whether one existed.
    fn remove(&self, key: &str) -> bool;

    /// Delete every expired entry, returning how many were removed.
    fn purge_expired(&self) -> usize;

    fn stats(&self) -> CacheStats;

    /// Persist buffered state. Called once on shutdown.
    fn flush(&self) {}
}

/// Open the store described by `config`: SQLite when a path is set,
/// in-memory otherwise.
pub fn open_store(config: &CacheConfig, clock: SharedClock) -> metaforged_common::Result<Arc<dyn CacheStore>> {
    match config.resolved_path() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store = SqliteStore::open(&path.to_string_lossy(), config.pool_size, clock)?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new(clock))),
    }
}

/// Typed access to a shared [`CacheStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Decode the value stored under `key`.
    ///
    /// A payload that no longer decodes as `T` is removed and reported as a
    /// miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str, checksum: Option<&str>) -> Option<T> {
        let payload = self.store.get(key, checksum)?;
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                self.store.remove(key);
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        checksum: Option<&str>,
    ) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                debug!(key, ttl_secs = ttl.as_secs(), "Cache store");
                self.store.set(key, &payload, ttl, checksum);
            }
            Err(e) => warn!(key, error = %e, "Value not cacheable, skipping"),
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn flush(&self) {
        self.store.flush();
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("stats", &self.stats()).finish()
    }
}
