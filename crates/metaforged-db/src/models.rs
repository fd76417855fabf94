//! Internal Rust models matching the database schema.

use chrono::{DateTime, TimeZone, Utc};

/// One row of the `cache_entries` table.
///
/// `payload` is the serialized cached value; the store never interprets it.
/// Timestamps are persisted as Unix milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub checksum: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        payload: impl Into<String>,
        checksum: Option<&str>,
        stored_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            checksum: checksum.map(str::to_string),
            stored_at,
            expires_at,
        }
    }

    /// Whether the entry is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the entry may be served to a reader presenting `checksum`.
    ///
    /// A reader without a checksum accepts any stored checksum; a reader with
    /// one requires an exact match.
    pub fn matches_checksum(&self, checksum: Option<&str>) -> bool {
        match checksum {
            None => true,
            Some(wanted) => self.checksum.as_deref() == Some(wanted),
        }
    }
}

/// Aggregate counts over the cache table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub expired: u64,
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
