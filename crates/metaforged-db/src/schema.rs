//! Cache schema versioning.
//!
//! The schema version lives in SQLite's `user_version` header field. Cached
//! rows can always be refetched, so an outdated layout is dropped and
//! recreated rather than migrated row by row. A file written by a newer
//! release is left untouched and refused.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

/// Layout version written by this release.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_CACHE_ENTRIES: &str = include_str!("sql/cache_entries.sql");

const DROP_CACHE_ENTRIES: &str = "DROP INDEX IF EXISTS idx_cache_entries_expires_at;
DROP TABLE IF EXISTS cache_entries;";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cache schema version {found} is newer than supported version {supported}")]
    TooNew { found: i64, supported: i64 },
}

/// What [`ensure_schema`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// No cache table yet; it was created.
    Created,
    /// Already at [`SCHEMA_VERSION`].
    Current,
    /// Older or unversioned layout discarded along with its cached rows.
    Rebuilt { from: i64 },
}

/// Read the stored schema version. `0` means no schema has been written.
pub fn stored_version(conn: &Connection) -> Result<i64, SchemaError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn cache_table_exists(conn: &Connection) -> Result<bool, SchemaError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'cache_entries'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Bring the cache tables to [`SCHEMA_VERSION`].
///
/// Runs inside an immediate transaction so two processes opening the same
/// cache file do not both rebuild it.
pub fn ensure_schema(conn: &Connection) -> Result<SchemaOutcome, SchemaError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let found = stored_version(&tx)?;
    let outcome = match found {
        SCHEMA_VERSION => SchemaOutcome::Current,
        older if older < SCHEMA_VERSION => {
            let had_table = cache_table_exists(&tx)?;
            tx.execute_batch(DROP_CACHE_ENTRIES)?;
            tx.execute_batch(CREATE_CACHE_ENTRIES)?;
            if had_table {
                SchemaOutcome::Rebuilt { from: older }
            } else {
                SchemaOutcome::Created
            }
        }
        newer => {
            return Err(SchemaError::TooNew {
                found: newer,
                supported: SCHEMA_VERSION,
            })
        }
    };

    if outcome != SchemaOutcome::Current {
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    tx.commit()?;
    Ok(outcome)
}
