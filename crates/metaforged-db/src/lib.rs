//! Metaforged-DB: durable storage for the metadata cache.
//!
//! This crate backs the cache store with SQLite using rusqlite and r2d2
//! connection pooling, so cached lookups survive process restarts.
//!
//! # Modules
//!
//! - `pool` - Connection pool management
//! - `schema` - Cache table layout and its version stamp
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use metaforged_db::models::CacheEntry;
//! use metaforged_db::pool::{get_conn, init_pool};
//! use metaforged_db::queries::cache_entries;
//!
//! let pool = init_pool("/var/lib/metaforged/cache.sqlite", 4).unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let now = Utc::now();
//! let entry = CacheEntry::new("tmdb.movie|alien|1979", "{}", None, now, now + Duration::days(14));
//! cache_entries::upsert(&conn, &entry).unwrap();
//! ```

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;
