//! Fuzzy resolution of a name against a folder listing.
//!
//! [`FuzzyMatcher::resolve`] builds (once, then from the cache) a
//! [`FolderIndex`] of the parent folder and scans it with decreasing
//! similarity thresholds. Direct children are tried at every threshold
//! before any subdirectory is considered, and the descent is bounded by
//! [`MAX_DEPTH`]. The target is compared as a literal name: separators in it
//! never select a sub-path.

mod index;
mod similarity;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

pub use index::{FolderEntry, FolderIndex, Filesystem, Listing, LocalFilesystem};
pub use similarity::{lcs_len, similarity};

use crate::cache::{Cache, CacheKey};
use crate::config::FuzzyConfig;

/// Hard limit on how many levels below the parent are searched.
pub const MAX_DEPTH: u8 = 1;

pub struct FuzzyMatcher {
    fs: Arc<dyn Filesystem>,
    cache: Cache,
    thresholds: Vec<f64>,
    max_depth: u8,
    index_ttl: Duration,
}

impl FuzzyMatcher {
    pub fn new(fs: Arc<dyn Filesystem>, cache: Cache, config: &FuzzyConfig, index_ttl: Duration) -> Self {
        let mut thresholds = config.thresholds.clone();
        if thresholds.is_empty() {
            thresholds = FuzzyConfig::default().thresholds;
        }
        Self {
            fs,
            cache,
            thresholds,
            max_depth: config.max_depth.min(MAX_DEPTH),
            index_ttl,
        }
    }

    /// Path of the entry below `parent` best matching `target`, if any.
    pub async fn resolve(&self, parent: &str, target: &str) -> Option<String> {
        if target.trim().is_empty() {
            return None;
        }
        let index = self.index(parent, false).await?;
        let found = best_match(&index, target, &self.thresholds, self.max_depth)
            .map(|entry| entry.path.clone());
        debug!(parent, target, found = ?found, "Fuzzy folder match");
        found
    }

    /// The cached index of `parent`, rebuilt when missing or when `refresh`
    /// is set. `None` when the folder cannot be listed.
    pub async fn index(&self, parent: &str, refresh: bool) -> Option<FolderIndex> {
        let key = CacheKey::folder_index(parent, self.max_depth);
        if !refresh {
            if let Some(index) = self.cache.get::<FolderIndex>(key.as_str(), None) {
                return Some(index);
            }
        }

        match FolderIndex::build(self.fs.as_ref(), parent, self.max_depth).await {
            Ok(index) => {
                self.cache.set(key.as_str(), &index, self.index_ttl, None);
                Some(index)
            }
            Err(e) => {
                warn!(parent, error = %e, "Cannot index folder");
                None
            }
        }
    }
}

/// Scan `index` for `target`.
///
/// Depths are searched shallowest first; within a depth each threshold is
/// tried in order and the best-scoring entry at the first satisfied
/// threshold wins (earlier entries win ties).
pub fn best_match<'a>(
    index: &'a FolderIndex,
    target: &str,
    thresholds: &[f64],
    max_depth: u8,
) -> Option<&'a FolderEntry> {
    let target = target.trim().to_lowercase();
    for depth in 0..=max_depth.min(MAX_DEPTH) {
        let scored: Vec<(&FolderEntry, f64)> = index
            .at_depth(depth)
            .map(|entry| (entry, similarity(&entry.name, &target)))
            .collect();
        if scored.is_empty() {
            continue;
        }

        for &threshold in thresholds {
            let mut best: Option<(&FolderEntry, f64)> = None;
            for &(entry, score) in &scored {
                if score >= threshold && best.map_or(true, |(_, b)| score > b) {
                    best = Some((entry, score));
                }
            }
            if let Some((entry, score)) = best {
                debug!(name = %entry.name, score, threshold, depth, "Fuzzy hit");
                return Some(entry);
            }
        }
    }
    None
}
