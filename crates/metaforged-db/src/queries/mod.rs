//! Database query modules.
//!
//! - cache_entries: cache entry lookup, upsert, and expiry maintenance

pub mod cache_entries;
