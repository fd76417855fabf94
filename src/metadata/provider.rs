//! Trait definition for metadata providers.
//!
//! A provider wraps one source (an artwork site, a metadata database, the
//! host's own library) and answers a [`ProviderQuery`] with a possibly empty
//! [`Record`]. Providers are black boxes to the resolver: they are invoked
//! through the memoizing wrapper with the key and limiter scope they declare
//! here.

use async_trait::async_trait;
use metaforged_common::{ProviderQuery, Record, Result};

use crate::cache::CacheKey;
use crate::memoize::TtlPolicy;

/// Async trait that all metadata providers must implement.
///
/// Providers are expected to be wrapped in an `Arc` so they can be shared
/// across tasks and registered in several chains.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &str;

    /// Returns `true` when the provider is configured and ready to serve
    /// requests. Unavailable providers are skipped without being called.
    fn is_available(&self) -> bool {
        true
    }

    /// Cache key of this provider's answer to `query`.
    fn cache_key(&self, query: &ProviderQuery) -> CacheKey {
        CacheKey::provider(self.name(), query)
    }

    /// Limiter key held while the provider runs for `query`.
    ///
    /// The default scopes the hold to this provider and query, so identical
    /// concurrent lookups are serialized (and the second one is then served
    /// from the cache) while different lookups proceed in parallel. Providers
    /// that never touch a remote service return `None`.
    fn rate_limit_key(&self, query: &ProviderQuery) -> Option<String> {
        Some(format!("provider:{}|{}", self.name(), query.fingerprint()))
    }

    /// Provider-specific cache lifetimes, overriding the caller's.
    fn ttl(&self) -> Option<TtlPolicy> {
        None
    }

    /// Look up `query`.
    ///
    /// An empty record means the source was reached but had no data.
    /// Transient failures must be reported as
    /// [`Error::Unavailable`](metaforged_common::Error::Unavailable), and every
    /// remote call must carry a finite timeout.
    async fn query(&self, query: &ProviderQuery) -> Result<Record>;

    /// Look up `query` on behalf of a resolution.
    ///
    /// Composite providers that make their own memoized calls receive the
    /// resolution's `bypass_cache` flag here. Plain providers ignore it.
    async fn query_for(&self, query: &ProviderQuery, bypass_cache: bool) -> Result<Record> {
        let _ = bypass_cache;
        self.query(query).await
    }
}
