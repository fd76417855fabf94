//! Database connection pool management.
//!
//! This module provides connection pooling for SQLite using r2d2.
//! It handles pool initialization, connection pragmas, and bringing the
//! cache schema up to date.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use metaforged_common::{Error, Result};

use tracing::info;

use crate::schema::{self, SchemaOutcome};

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pragmas applied to every new file-backed connection.
///
/// WAL lets several processes read the cache while one writes; the busy
/// timeout keeps concurrent writers from failing immediately on a lock.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;";

/// Initialize a new database pool with the given file path.
///
/// This function will:
/// - Create the SQLite database file if it doesn't exist
/// - Set up connection pooling with r2d2
/// - Enable WAL mode and a busy timeout on all connections
/// - Create or rebuild the cache tables for the current schema version
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file
/// * `max_size` - Maximum number of pooled connections
///
/// # Example
///
/// ```no_run
/// use metaforged_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/metaforged/cache.sqlite", 4).unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str, max_size: u32) -> Result<DbPool> {
    let manager =
        SqliteConnectionManager::file(db_path).with_init(|conn| conn.execute_batch(FILE_PRAGMAS));

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    prepare_schema(&pool)?;

    Ok(pool)
}

/// Initialize an in-memory database pool for testing.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// limited to a single connection. The data is lost when the pool is dropped.
///
/// # Example
///
/// ```
/// use metaforged_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    prepare_schema(&pool)?;

    Ok(pool)
}

fn prepare_schema(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    match schema::ensure_schema(&conn)
        .map_err(|e| Error::database(format!("Failed to prepare cache schema: {}", e)))?
    {
        SchemaOutcome::Current => {}
        SchemaOutcome::Created => info!("Created cache schema v{}", schema::SCHEMA_VERSION),
        SchemaOutcome::Rebuilt { from } => info!(
            "Discarded cache schema v{} and rebuilt at v{}",
            from,
            schema::SCHEMA_VERSION
        ),
    }
    Ok(())
}

/// Get a connection from the pool.
///
/// This is a convenience wrapper around `pool.get()` that converts the
/// r2d2 error into our common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}

/// Flush the write-ahead log into the main database file.
///
/// Called on shutdown so the cache file is self-contained. A no-op for
/// in-memory databases.
pub fn checkpoint(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .map_err(|e| Error::database(format!("Failed to checkpoint WAL: {}", e)))
}
