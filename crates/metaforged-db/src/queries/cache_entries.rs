//! Cache entry queries.
//!
//! Entries are written whole with `INSERT OR REPLACE`; there is no partial
//! update. Expiry is enforced by callers on read and by [`delete_expired`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use metaforged_common::{Error, Result};

use crate::models::{from_millis, to_millis, CacheEntry, CacheStats};

/// Store an entry, replacing any previous entry with the same key.
pub fn upsert(conn: &Connection, entry: &CacheEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cache_entries (key, payload, checksum, stored_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.key,
            entry.payload,
            entry.checksum,
            to_millis(entry.stored_at),
            to_millis(entry.expires_at),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get an entry by key, regardless of expiry.
pub fn get(conn: &Connection, key: &str) -> Result<Option<CacheEntry>> {
    conn.query_row(
        "SELECT key, payload, checksum, stored_at, expires_at
         FROM cache_entries WHERE key = ?1",
        params![key],
        |row| {
            Ok(CacheEntry {
                key: row.get(0)?,
                payload: row.get(1)?,
                checksum: row.get(2)?,
                stored_at: from_millis(row.get(3)?),
                expires_at: from_millis(row.get(4)?),
            })
        },
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete an entry. Returns whether a row was removed.
pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// Delete `key` only if it is expired at `now`.
///
/// Used for lazy reaping: a concurrent writer that refreshed the entry in the
/// meantime is not clobbered.
pub fn delete_if_expired(conn: &Connection, key: &str, now: DateTime<Utc>) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM cache_entries WHERE key = ?1 AND expires_at <= ?2",
            params![key, to_millis(now)],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// Delete every entry expired at `now`. Returns the number removed.
pub fn delete_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "DELETE FROM cache_entries WHERE expires_at <= ?1",
        params![to_millis(now)],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Count all entries and those expired at `now`.
pub fn stats(conn: &Connection, now: DateTime<Utc>) -> Result<CacheStats> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0)
         FROM cache_entries",
        params![to_millis(now)],
        |row| {
            Ok(CacheStats {
                entries: row.get::<_, i64>(0)? as u64,
                expired: row.get::<_, i64>(1)? as u64,
            })
        },
    )
    .map_err(|e| Error::database(e.to_string()))
}
