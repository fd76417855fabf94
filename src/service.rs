//! Entry point used by callers that resolve metadata.
//!
//! [`MetadataService`] owns one cache, one rate limiter and one provider
//! registry, and exposes resolution, movie-set aggregation, folder matching
//! and artwork write-back on top of them.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metaforged_common::{Error, MediaKind, ProviderQuery, Record, Result, SharedClock, SystemClock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{open_store, Cache, CacheKey, CacheStats, CacheStore};
use crate::config::Config;
use crate::fuzzy::{Filesystem, FuzzyMatcher};
use crate::memoize::{Lookup, Memoizer};
use crate::metadata::local::{write_back_artwork, LocalDatabase, LocalLibraryProvider};
use crate::metadata::movieset::movie_set_details;
use crate::metadata::prompt::{select_best_match, UserPrompt};
use crate::metadata::{Provider, ProviderRegistry};
use crate::ratelimit::RateLimiter;
use crate::resolver::{call_provider, Resolution, ResolveMode, ResolveOptions, Resolver};

pub struct MetadataService {
    config: Config,
    cache: Cache,
    resolver: Resolver,
    registry: ProviderRegistry,
    fuzzy: FuzzyMatcher,
    library: Option<Arc<dyn LocalDatabase>>,
}

impl MetadataService {
    /// Open the cache configured in `config` with the system clock.
    pub fn open(config: Config, registry: ProviderRegistry, fs: Arc<dyn Filesystem>) -> Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);
        let store = open_store(&config.cache, clock)?;
        Ok(Self::new(config, store, registry, fs))
    }

    pub fn new(
        config: Config,
        store: Arc<dyn CacheStore>,
        registry: ProviderRegistry,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        let cache = Cache::new(store);
        let limiter = RateLimiter::new(config.rate_limit.settings());
        let resolver = Resolver::new(Memoizer::new(cache.clone(), limiter));
        let fuzzy = FuzzyMatcher::new(
            fs,
            cache.clone(),
            &config.fuzzy,
            config.cache.folder_index_ttl(),
        );
        Self {
            config,
            cache,
            resolver,
            registry,
            fuzzy,
            library: None,
        }
    }

    /// Attach the host library and register it as the `local` provider.
    pub fn with_library(mut self, db: Arc<dyn LocalDatabase>) -> Self {
        self.registry
            .register(Arc::new(LocalLibraryProvider::new(db.clone())));
        self.library = Some(db);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        self.resolver.memoizer().limiter()
    }

    /// Options for `mode` with the configured TTLs.
    pub fn options(&self, mode: ResolveMode) -> ResolveOptions {
        ResolveOptions::new(mode, self.config.cache.ttl_policy())
    }

    /// Resolve `query` through `chain`.
    ///
    /// Unless the options name a key, the final record is cached under
    /// [`CacheKey::resolved`] for this chain and mode.
    pub async fn resolve(
        &self,
        query: &ProviderQuery,
        chain: &[Arc<dyn Provider>],
        mut options: ResolveOptions,
    ) -> Result<Resolution> {
        if options.cache_key.is_none() {
            let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
            options.cache_key = Some(CacheKey::resolved(&names, options.mode.as_str(), query));
        }
        self.resolver.resolve(query, chain, &options).await
    }

    /// Resolve through registered providers, in the order given.
    pub async fn resolve_named(
        &self,
        query: &ProviderQuery,
        names: &[&str],
        options: ResolveOptions,
    ) -> Result<Resolution> {
        let chain = self.registry.chain(names)?;
        self.resolve(query, &chain, options).await
    }

    /// Ask every available provider in `names`, let `prompt` choose, and
    /// store the choice as the first-match resolution for this chain.
    ///
    /// Cached results are never read here; fresh provider answers are still
    /// cached.
    pub async fn resolve_interactive(
        &self,
        query: &ProviderQuery,
        names: &[&str],
        prompt: &dyn UserPrompt,
    ) -> Result<Option<Record>> {
        let chain = self.registry.chain(names)?;
        let ttl = self.config.cache.ttl_policy();
        let memo = self.resolver.memoizer();

        let available: Vec<Arc<dyn Provider>> =
            chain.into_iter().filter(|p| p.is_available()).collect();
        let answers = join_all(
            available
                .iter()
                .map(|p| call_provider(memo, p.as_ref(), query, ttl, true)),
        )
        .await;

        let mut candidates = Vec::new();
        let mut unavailable = 0usize;
        for (provider, answer) in available.iter().zip(answers) {
            match answer {
                Ok(Lookup::Found(record)) => {
                    candidates.push(record.with("source", provider.name()));
                }
                Ok(Lookup::NotFound) => {}
                Err(e) if e.is_unavailable() => {
                    warn!(provider = provider.name(), error = %e, "Provider unavailable");
                    unavailable += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if !available.is_empty() && unavailable == available.len() {
            return Err(Error::unavailable(format!(
                "all {unavailable} providers unavailable for {}",
                query.fingerprint()
            )));
        }

        let chosen = select_best_match(query, candidates, Some(prompt)).await;
        if let Some(record) = &chosen {
            let key = CacheKey::resolved(names, ResolveMode::FirstMatch.as_str(), query);
            self.cache
                .set(key.as_str(), &Lookup::Found(record), ttl.positive, None);
        }
        Ok(chosen)
    }

    pub fn get_cached<T: DeserializeOwned>(&self, key: &str, checksum: Option<&str>) -> Option<T> {
        self.cache.get(key, checksum)
    }

    /// Store `value` under `key`; `ttl` defaults to the configured positive
    /// TTL.
    pub fn set_cached<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        checksum: Option<&str>,
    ) {
        let ttl = ttl.unwrap_or(self.config.cache.ttl_policy().positive);
        self.cache.set(key, value, ttl, checksum);
    }

    /// Drop one cached entry so the next lookup goes to the providers.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.remove(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn movie_set_details(&self, set_id: i64) -> Result<Lookup<Record>> {
        let db = self.require_library()?;
        let ttl = self.config.cache.ttl_policy().positive;
        movie_set_details(&self.cache, db.as_ref(), set_id, ttl).await
    }

    /// Path below `parent` whose name best matches `name`.
    pub async fn resolve_folder(&self, parent: &str, name: &str) -> Option<String> {
        self.fuzzy.resolve(parent, name).await
    }

    pub async fn write_back_artwork(&self, kind: MediaKind, id: i64, record: &Record) -> Result<bool> {
        let db = self.require_library()?;
        write_back_artwork(db.as_ref(), kind, id, record).await
    }

    /// Flush pending cache writes.
    pub fn close(&self) {
        self.cache.flush();
        info!(stats = ?self.cache.stats(), "Metadata service closed");
    }

    fn require_library(&self) -> Result<&Arc<dyn LocalDatabase>> {
        self.library
            .as_ref()
            .ok_or_else(|| Error::invalid_input("no local library attached"))
    }
}
