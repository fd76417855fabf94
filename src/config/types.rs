use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::memoize::TtlPolicy;
use crate::ratelimit::LimiterSettings;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub fuzzy: FuzzyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// SQLite file backing the cache. In-memory when unset.
    #[serde(default)]
    pub path: Option<String>,

    /// Lifetime of positive results (default: 14 days)
    #[serde(default = "default_ttl_days")]
    pub default_ttl_days: u64,

    /// Lifetime of NotFound results (default: 6 hours)
    #[serde(default = "default_negative_ttl_hours")]
    pub negative_ttl_hours: u64,

    /// Lifetime of cached directory listings (default: 90 days)
    #[serde(default = "default_folder_index_ttl_days")]
    pub folder_index_ttl_days: u64,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_ttl_days() -> u64 {
    14
}

fn default_negative_ttl_hours() -> u64 {
    6
}

fn default_folder_index_ttl_days() -> u64 {
    90
}

fn default_pool_size() -> u32 {
    4
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_ttl_days: default_ttl_days(),
            negative_ttl_hours: default_negative_ttl_hours(),
            folder_index_ttl_days: default_folder_index_ttl_days(),
            pool_size: default_pool_size(),
        }
    }
}

impl CacheConfig {
    /// Cache file path with `~` and environment variables expanded.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        let path = self.path.as_deref()?.trim();
        if path.is_empty() {
            return None;
        }
        let expanded = shellexpand::full(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
        Some(PathBuf::from(expanded))
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(
            Duration::from_secs(self.default_ttl_days * 24 * 3600),
            Duration::from_secs(self.negative_ttl_hours * 3600),
        )
    }

    pub fn folder_index_ttl(&self) -> Duration {
        Duration::from_secs(self.folder_index_ttl_days * 24 * 3600)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before a waiter proceeds without the slot (default: 100)
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Delay after release before the key can be taken again
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_max_polls() -> u32 {
    100
}

fn default_cooldown_ms() -> u64 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn settings(&self) -> LimiterSettings {
        LimiterSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Token-bucket quota applied per upstream host
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Retries on HTTP 429 before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_requests_per_second() -> u32 {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("metaforged/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FuzzyConfig {
    /// Similarity thresholds, strictest first
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,

    /// Levels of subdirectories searched below the parent (default: 1)
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

fn default_thresholds() -> Vec<f64> {
    vec![1.0, 0.95, 0.9, 0.8]
}

fn default_max_depth() -> u8 {
    1
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            max_depth: default_max_depth(),
        }
    }
}
