use std::fmt;

use metaforged_common::ProviderQuery;

/// A cache key built from a namespace and a query-derived suffix.
///
/// Namespaces keep unrelated lookups apart: a provider result, a resolved
/// record and a folder index for the same title never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Raw result of one provider for one query.
    pub fn provider(provider: &str, query: &ProviderQuery) -> Self {
        Self(format!("provider.{provider}|{}", query.fingerprint()))
    }

    /// Final merged record for a chain of providers.
    pub fn resolved(chain: &[&str], mode: &str, query: &ProviderQuery) -> Self {
        Self(format!(
            "resolved.{}.{mode}|{}",
            chain.join("+"),
            query.fingerprint()
        ))
    }

    /// Directory index of `parent` built down to `max_depth`.
    pub fn folder_index(parent: &str, max_depth: u8) -> Self {
        Self(format!("folder_index.{max_depth}|{parent}"))
    }

    pub fn movie_set(set_id: i64) -> Self {
        Self(format!("movieset.{set_id}"))
    }

    /// Free-form key for callers with their own resolution logic.
    pub fn custom(namespace: &str, parts: &[&str]) -> Self {
        let mut key = namespace.to_string();
        for part in parts {
            key.push('|');
            key.push_str(&part.trim().to_lowercase());
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
