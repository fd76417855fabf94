//! Metaforged-Common: shared types and utilities.
//!
//! This crate provides the vocabulary used across metaforged:
//!
//! - **Records**: the tagged-union [`Value`] / [`Record`] model that providers
//!   return and the deep merger combines
//! - **Queries**: [`ProviderQuery`] and [`MediaKind`]
//! - **Clock**: an injectable [`Clock`] so cache expiry is testable
//! - **Text helpers**: title, artist and artwork-URI cleanup
//! - **Error Handling**: common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use metaforged_common::{MediaKind, ProviderQuery, Record, Error, Result};
//!
//! let query = ProviderQuery::new(MediaKind::Movie, "Alien (1979)").with_year(1979);
//! assert_eq!(query.title, "Alien");
//!
//! let record = Record::new().with("title", "Alien");
//! assert!(record.has("title"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::unavailable("upstream timed out"))
//! }
//! assert!(example().unwrap_err().is_unavailable());
//! ```

pub mod clock;
pub mod error;
pub mod query;
pub mod record;
pub mod text;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{Error, Result};
pub use query::{MediaKind, ProviderQuery};
pub use record::{Record, Scalar, Value, ART_FIELD};
