//! Memoizing call wrapper.
//!
//! Wraps an expensive lookup with a cache read, an optional rate-limit hold
//! and a cache write. Found and NotFound outcomes are both cached, NotFound
//! with the shorter negative TTL. Errors (most importantly
//! [`Error::Unavailable`]) are propagated and never cached, so the next
//! request retries once the limiter cool-down has passed.

use std::future::Future;
use std::time::Duration;

use metaforged_common::{Error, Record, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::ratelimit::RateLimiter;

/// Outcome of a lookup that reached its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(value) => Lookup::Found(value),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl Lookup<Record> {
    /// An empty record is a NotFound.
    pub fn from_record(record: Record) -> Self {
        if record.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::Found(record)
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// Cache lifetimes for positive and negative outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub positive: Duration,
    pub negative: Duration,
}

impl TtlPolicy {
    /// The negative TTL is capped at the positive one.
    pub fn new(positive: Duration, negative: Duration) -> Self {
        Self {
            positive,
            negative: negative.min(positive),
        }
    }

    pub fn for_outcome<T>(&self, lookup: &Lookup<T>) -> Duration {
        match lookup {
            Lookup::Found(_) => self.positive,
            Lookup::NotFound => self.negative,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(14 * 24 * 3600),
            Duration::from_secs(6 * 3600),
        )
    }
}

/// Parameters for one memoized call.
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub key: String,
    pub ttl: TtlPolicy,
    /// Skip the cache read; the fresh result is still stored.
    pub bypass: bool,
    pub limit_key: Option<String>,
    pub checksum: Option<String>,
}

impl CallSpec {
    pub fn new(key: impl Into<String>, ttl: TtlPolicy) -> Self {
        Self {
            key: key.into(),
            ttl,
            bypass: false,
            limit_key: None,
            checksum: None,
        }
    }

    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn limit(mut self, key: Option<String>) -> Self {
        self.limit_key = key;
        self
    }

    pub fn checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Cache plus limiter, shared by everything that memoizes.
#[derive(Clone)]
pub struct Memoizer {
    cache: Cache,
    limiter: RateLimiter,
}

impl Memoizer {
    pub fn new(cache: Cache, limiter: RateLimiter) -> Self {
        Self { cache, limiter }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Return the cached outcome for `spec.key`, or run `op` and cache its
    /// outcome.
    pub async fn call<T, F, Fut>(&self, spec: &CallSpec, op: F) -> Result<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Lookup<T>>>,
    {
        let checksum = spec.checksum.as_deref();
        if !spec.bypass {
            if let Some(hit) = self.cache.get::<Lookup<T>>(&spec.key, checksum) {
                debug!(key = %spec.key, found = hit.is_found(), "Cache hit");
                return Ok(hit);
            }
        }

        let _guard = match &spec.limit_key {
            Some(limit_key) => Some(self.limiter.acquire(limit_key).await),
            None => None,
        };

        // Another holder of the same key may have filled the entry while we
        // waited.
        if !spec.bypass && spec.limit_key.is_some() {
            if let Some(hit) = self.cache.get::<Lookup<T>>(&spec.key, checksum) {
                debug!(key = %spec.key, "Cache filled while waiting for rate limit");
                return Ok(hit);
            }
        }

        debug!(key = %spec.key, bypass = spec.bypass, "Cache miss, invoking source");
        match op().await {
            Ok(lookup) => {
                self.cache
                    .set(&spec.key, &lookup, spec.ttl.for_outcome(&lookup), checksum);
                Ok(lookup)
            }
            Err(e) => {
                match &e {
                    Error::Unavailable(reason) => {
                        warn!(key = %spec.key, reason = %reason, "Source unavailable, not caching")
                    }
                    other => warn!(key = %spec.key, error = %other, "Source failed, not caching"),
                }
                Err(e)
            }
        }
    }
}
