//! Provider-facing side of metadata resolution.
//!
//! # Module layout
//!
//! - [`provider`] -- The [`Provider`] trait every metadata source implements.
//! - [`registry`] -- Named providers and chain assembly.
//! - [`local`] -- Adapter over the host media database.
//! - [`movieset`] -- Movie-set aggregation with checksum-validated caching.
//! - [`prompt`] -- Candidate ranking and manual disambiguation.

pub mod local;
pub mod movieset;
pub mod prompt;
pub mod provider;
pub mod registry;

pub use local::{
    write_back_artwork, Condition, Filter, InMemoryLibrary, LocalDatabase, LocalLibraryProvider,
    Operator,
};
pub use movieset::{aggregate_members, members_checksum, movie_set_details};
pub use prompt::{rank_candidates, score_candidate, select_best_match, Candidate, UserPrompt};
pub use provider::Provider;
pub use registry::ProviderRegistry;
