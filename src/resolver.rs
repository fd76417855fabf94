//! Fallback resolution over an ordered chain of providers.
//!
//! In [`ResolveMode::FirstMatch`] providers are tried in order and the first
//! non-empty answer wins; later providers are never invoked. In
//! [`ResolveMode::Aggregate`] every provider contributes and results are deep
//! merged in chain order, stopping early once a [`Sufficiency`] predicate
//! holds. Each provider call goes through the memoizing wrapper.
//!
//! If every attempted provider is unavailable the resolution fails with
//! [`Error::Unavailable`]; a mix of NotFound and unavailable answers yields an
//! empty, degraded resolution that is not cached.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use metaforged_common::{Error, ProviderQuery, Record, Result};
use tracing::{debug, info, warn};

use crate::cache::CacheKey;
use crate::memoize::{CallSpec, Lookup, Memoizer, TtlPolicy};
use crate::merge::{merge_into, MergePolicy};
use crate::metadata::Provider;

/// Predicate over the accumulated record that ends aggregation early.
#[derive(Clone)]
pub struct Sufficiency(Arc<dyn Fn(&Record) -> bool + Send + Sync>);

impl Sufficiency {
    pub fn new(predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Satisfied once every field in `fields` holds a non-empty value.
    ///
    /// Dotted paths reach into nested records, e.g. `"art.poster"`.
    pub fn has_fields(fields: &[&str]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        Self::new(move |record| fields.iter().all(|path| has_path(record, path)))
    }

    pub fn is_satisfied(&self, record: &Record) -> bool {
        (self.0)(record)
    }
}

impl fmt::Debug for Sufficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sufficiency(..)")
    }
}

fn has_path(record: &Record, path: &str) -> bool {
    match path.split_once('.') {
        None => record.has(path),
        Some((head, rest)) => record
            .get(head)
            .and_then(|v| v.as_record())
            .is_some_and(|inner| has_path(inner, rest)),
    }
}

#[derive(Debug, Clone, Default)]
pub enum ResolveMode {
    #[default]
    FirstMatch,
    Aggregate {
        until: Option<Sufficiency>,
    },
}

impl ResolveMode {
    pub fn aggregate() -> Self {
        ResolveMode::Aggregate { until: None }
    }

    pub fn aggregate_until(until: Sufficiency) -> Self {
        ResolveMode::Aggregate { until: Some(until) }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::FirstMatch => "first",
            ResolveMode::Aggregate { .. } => "aggregate",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub mode: ResolveMode,
    pub ttl: TtlPolicy,
    /// Skip cache reads for this resolution. Fresh results are still stored.
    pub bypass_cache: bool,
    pub policy: MergePolicy,
    /// Key under which the final record is cached, if at all.
    pub cache_key: Option<CacheKey>,
}

impl ResolveOptions {
    pub fn new(mode: ResolveMode, ttl: TtlPolicy) -> Self {
        Self {
            mode,
            ttl,
            ..Default::default()
        }
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    pub fn policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache_as(mut self, key: CacheKey) -> Self {
        self.cache_key = Some(key);
        self
    }
}

/// Result of one resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub record: Record,
    /// Providers that contributed, in chain order.
    pub sources: Vec<String>,
    /// At least one provider was unavailable, so the record may be partial.
    pub degraded: bool,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn into_lookup(self) -> Lookup<Record> {
        Lookup::from_record(self.record)
    }
}

/// Call one provider through the memoizing wrapper.
pub async fn call_provider(
    memo: &Memoizer,
    provider: &dyn Provider,
    query: &ProviderQuery,
    ttl: TtlPolicy,
    bypass: bool,
) -> Result<Lookup<Record>> {
    let spec = CallSpec::new(provider.cache_key(query), provider.ttl().unwrap_or(ttl))
        .bypass(bypass)
        .limit(provider.rate_limit_key(query));

    memo.call(&spec, || async {
        provider.query_for(query, bypass).await.map(Lookup::from_record)
    })
    .await
}

#[derive(Clone)]
pub struct Resolver {
    memo: Memoizer,
}

impl Resolver {
    pub fn new(memo: Memoizer) -> Self {
        Self { memo }
    }

    pub fn memoizer(&self) -> &Memoizer {
        &self.memo
    }

    pub async fn resolve(
        &self,
        query: &ProviderQuery,
        chain: &[Arc<dyn Provider>],
        options: &ResolveOptions,
    ) -> Result<Resolution> {
        if let Some(key) = &options.cache_key {
            if !options.bypass_cache {
                if let Some(hit) = self.memo.cache().get::<Lookup<Record>>(key.as_str(), None) {
                    debug!(key = %key, "Resolved record served from cache");
                    return Ok(Resolution {
                        record: hit.found().unwrap_or_default(),
                        ..Default::default()
                    });
                }
            }
        }

        let resolution = self.run_chain(query, chain, options).await?;

        if let Some(key) = &options.cache_key {
            if resolution.degraded {
                debug!(key = %key, "Degraded resolution, not caching");
            } else {
                let lookup = Lookup::from_record(resolution.record.clone());
                let ttl = options.ttl.for_outcome(&lookup);
                self.memo.cache().set(key.as_str(), &lookup, ttl, None);
            }
        }

        info!(
            query = %query.fingerprint(),
            mode = options.mode.as_str(),
            sources = ?resolution.sources,
            degraded = resolution.degraded,
            found = !resolution.is_empty(),
            "Resolution complete"
        );
        Ok(resolution)
    }

    async fn run_chain(
        &self,
        query: &ProviderQuery,
        chain: &[Arc<dyn Provider>],
        options: &ResolveOptions,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut attempted = 0usize;
        let mut unavailable = 0usize;

        for provider in chain {
            if !provider.is_available() {
                debug!(provider = provider.name(), "Provider not available, skipping");
                continue;
            }
            attempted += 1;

            let lookup = call_provider(
                &self.memo,
                provider.as_ref(),
                query,
                options.ttl,
                options.bypass_cache,
            )
            .await;

            match lookup {
                Ok(Lookup::Found(record)) => {
                    resolution.sources.push(provider.name().to_string());
                    match &options.mode {
                        ResolveMode::FirstMatch => {
                            resolution.record = record;
                            return Ok(resolution);
                        }
                        ResolveMode::Aggregate { until } => {
                            merge_into(&mut resolution.record, &record, &options.policy);
                            if until.as_ref().is_some_and(|u| u.is_satisfied(&resolution.record)) {
                                debug!(provider = provider.name(), "Sufficient, stopping aggregation");
                                break;
                            }
                        }
                    }
                }
                Ok(Lookup::NotFound) => {
                    debug!(provider = provider.name(), "Provider has no data");
                }
                Err(e) if e.is_unavailable() => {
                    warn!(provider = provider.name(), error = %e, "Provider unavailable");
                    unavailable += 1;
                    resolution.degraded = true;
                }
                Err(e) => return Err(e),
            }
        }

        if attempted > 0 && unavailable == attempted {
            return Err(Error::unavailable(format!(
                "all {attempted} providers unavailable for {}",
                query.fingerprint()
            )));
        }
        Ok(resolution)
    }
}

/// Builds the second query of a chained lookup from the first query and the
/// first provider's record. `None` ends the chain with NotFound.
pub type Bridge = Arc<dyn Fn(&ProviderQuery, &Record) -> Option<ProviderQuery> + Send + Sync>;

/// Two providers composed sequentially, e.g. resolve an IMDb id by title,
/// then fetch artwork by that id.
///
/// Both steps go through the memoizing wrapper under their own keys.
pub struct ChainedProvider {
    name: String,
    first: Arc<dyn Provider>,
    second: Arc<dyn Provider>,
    bridge: Bridge,
    memo: Memoizer,
    ttl: TtlPolicy,
}

impl ChainedProvider {
    pub fn new(
        name: impl Into<String>,
        first: Arc<dyn Provider>,
        second: Arc<dyn Provider>,
        bridge: impl Fn(&ProviderQuery, &Record) -> Option<ProviderQuery> + Send + Sync + 'static,
        memo: Memoizer,
        ttl: TtlPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            first,
            second,
            bridge: Arc::new(bridge),
            memo,
            ttl,
        }
    }
}

#[async_trait]
impl Provider for ChainedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.first.is_available() && self.second.is_available()
    }

    fn rate_limit_key(&self, _query: &ProviderQuery) -> Option<String> {
        None
    }

    async fn query(&self, query: &ProviderQuery) -> Result<Record> {
        self.query_for(query, false).await
    }

    async fn query_for(&self, query: &ProviderQuery, bypass_cache: bool) -> Result<Record> {
        let first =
            call_provider(&self.memo, self.first.as_ref(), query, self.ttl, bypass_cache).await?;
        let Some(intermediate) = first.found() else {
            return Ok(Record::new());
        };
        let Some(next) = (self.bridge)(query, &intermediate) else {
            debug!(provider = %self.name, "Bridge produced no follow-up query");
            return Ok(Record::new());
        };

        let second =
            call_provider(&self.memo, self.second.as_ref(), &next, self.ttl, bypass_cache).await?;
        Ok(second.found().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryStore};
    use crate::ratelimit::RateLimiter;
    use metaforged_common::{ManualClock, MediaKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        answer: Result<Record>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, answer: Result<Record>) -> Arc<Self> {
            Arc::new(Self {
                name,
                answer,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, _query: &ProviderQuery) -> Result<Record> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(record) => Ok(record.clone()),
                Err(e) => Err(Error::unavailable(e.to_string())),
            }
        }
    }

    fn chained(resolver: &Resolver, ids: &Arc<Scripted>, art: &Arc<Scripted>) -> Vec<Arc<dyn Provider>> {
        let chained = ChainedProvider::new(
            "ids+art",
            ids.clone(),
            art.clone(),
            |q, record| {
                record
                    .get_str("imdbnumber")
                    .map(|id| ProviderQuery::by_id(q.kind, "imdb", id))
            },
            resolver.memoizer().clone(),
            TtlPolicy::default(),
        );
        vec![Arc::new(chained)]
    }

    fn resolver() -> Resolver {
        let cache = Cache::new(Arc::new(MemoryStore::new(Arc::new(ManualClock::default()))));
        Resolver::new(Memoizer::new(cache, RateLimiter::default()))
    }

    fn query() -> ProviderQuery {
        ProviderQuery::new(MediaKind::Movie, "The Matrix").with_year(1999)
    }

    fn chain(providers: &[&Arc<Scripted>]) -> Vec<Arc<dyn Provider>> {
        providers
            .iter()
            .map(|p| Arc::clone(*p) as Arc<dyn Provider>)
            .collect()
    }

    #[tokio::test]
    async fn test_first_match_short_circuits() {
        let p1 = Scripted::new("p1", Ok(Record::new()));
        let p2 = Scripted::new("p2", Ok(Record::new().with("title", "X")));
        let p3 = Scripted::new("p3", Ok(Record::new().with("title", "Y")));

        let resolution = resolver()
            .resolve(&query(), &chain(&[&p1, &p2, &p3]), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolution.record, Record::new().with("title", "X"));
        assert_eq!(resolution.sources, vec!["p2"]);
        assert_eq!(p3.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_unavailable_fails() {
        let p1 = Scripted::new("p1", Err(Error::unavailable("timeout")));
        let p2 = Scripted::new("p2", Err(Error::unavailable("refused")));

        let err = resolver()
            .resolve(&query(), &chain(&[&p1, &p2]), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_unavailable_then_found_is_degraded() {
        let p1 = Scripted::new("p1", Err(Error::unavailable("timeout")));
        let p2 = Scripted::new("p2", Ok(Record::new().with("title", "X")));

        let resolution = resolver()
            .resolve(&query(), &chain(&[&p1, &p2]), &ResolveOptions::default())
            .await
            .unwrap();
        assert!(resolution.degraded);
        assert_eq!(resolution.record.get_str("title"), Some("X"));
    }

    #[tokio::test]
    async fn test_aggregate_merges_in_order_until_sufficient() {
        let p1 = Scripted::new("p1", Ok(Record::new().with("title", "A").with("genre", vec!["x"])));
        let p2 = Scripted::new(
            "p2",
            Ok(Record::new()
                .with("title", "B")
                .with("genre", vec!["y"])
                .with("art", Record::new().with("poster", "p.jpg"))),
        );
        let p3 = Scripted::new("p3", Ok(Record::new().with("plot", "never fetched")));

        let options = ResolveOptions::new(
            ResolveMode::aggregate_until(Sufficiency::has_fields(&["title", "art.poster"])),
            TtlPolicy::default(),
        );
        let resolution = resolver()
            .resolve(&query(), &chain(&[&p1, &p2, &p3]), &options)
            .await
            .unwrap();

        assert_eq!(resolution.record.get_str("title"), Some("A"));
        assert_eq!(
            resolution.record.get("genre"),
            Some(&metaforged_common::Value::from(vec!["x", "y"]))
        );
        assert_eq!(resolution.sources, vec!["p1", "p2"]);
        assert_eq!(p3.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_providers_are_skipped() {
        struct Offline;

        #[async_trait]
        impl Provider for Offline {
            fn name(&self) -> &str {
                "offline"
            }
            fn is_available(&self) -> bool {
                false
            }
            async fn query(&self, _query: &ProviderQuery) -> Result<Record> {
                panic!("offline provider must not be queried");
            }
        }

        let chain: Vec<Arc<dyn Provider>> = vec![Arc::new(Offline)];
        let resolution = resolver()
            .resolve(&query(), &chain, &ResolveOptions::default())
            .await
            .unwrap();
        assert!(resolution.is_empty());
        assert!(!resolution.degraded);
    }

    #[tokio::test]
    async fn test_final_record_cached_unless_degraded() {
        let resolver = resolver();
        let key = CacheKey::resolved(&["p1"], "first", &query());
        let options = ResolveOptions::default().cache_as(key.clone());

        let p1 = Scripted::new("p1", Ok(Record::new().with("title", "X")));
        resolver.resolve(&query(), &chain(&[&p1]), &options).await.unwrap();
        assert!(resolver
            .memoizer()
            .cache()
            .get::<Lookup<Record>>(key.as_str(), None)
            .is_some());

        let degraded_key = CacheKey::resolved(&["down", "p1"], "first", &query());
        let down = Scripted::new("down", Err(Error::unavailable("timeout")));
        resolver
            .resolve(
                &query(),
                &chain(&[&down, &p1]),
                &ResolveOptions::default().cache_as(degraded_key.clone()),
            )
            .await
            .unwrap();
        assert!(resolver
            .memoizer()
            .cache()
            .get::<Lookup<Record>>(degraded_key.as_str(), None)
            .is_none());
    }

    #[tokio::test]
    async fn test_chained_provider_feeds_second_query() {
        let resolver = resolver();
        let ids = Scripted::new("ids", Ok(Record::new().with("imdbnumber", "tt0133093")));
        let art = Scripted::new(
            "art",
            Ok(Record::new().with("art", Record::new().with("clearlogo", "logo.png"))),
        );
        let chain = chained(&resolver, &ids, &art);

        let resolution = resolver
            .resolve(&query(), &chain, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(
            resolution.record.art().unwrap().get_str("clearlogo"),
            Some("logo.png")
        );
        assert_eq!(ids.calls(), 1);
        assert_eq!(art.calls(), 1);

        resolver
            .resolve(&query(), &chain, &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(ids.calls(), 1);
        assert_eq!(art.calls(), 1);
    }

    #[tokio::test]
    async fn test_bypass_reaches_chained_steps() {
        let resolver = resolver();
        let ids = Scripted::new("ids", Ok(Record::new().with("imdbnumber", "tt0133093")));
        let art = Scripted::new(
            "art",
            Ok(Record::new().with("art", Record::new().with("clearlogo", "logo.png"))),
        );
        let chain = chained(&resolver, &ids, &art);
        let options = ResolveOptions::default().bypass_cache(true);

        resolver.resolve(&query(), &chain, &options).await.unwrap();
        resolver.resolve(&query(), &chain, &options).await.unwrap();

        assert_eq!(ids.calls(), 2);
        assert_eq!(art.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_transient_errors_propagate() {
        struct Broken;

        #[async_trait]
        impl Provider for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            async fn query(&self, _query: &ProviderQuery) -> Result<Record> {
                Err(Error::database("disk image is malformed"))
            }
        }

        let fallback = Scripted::new("fallback", Ok(Record::new().with("title", "X")));
        let chain: Vec<Arc<dyn Provider>> = vec![Arc::new(Broken), fallback.clone()];

        let err = resolver()
            .resolve(&query(), &chain, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert_matches::assert_matches!(err, Error::Database(_));
        assert_eq!(fallback.calls(), 0);
    }
}
