mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::fuzzy::MAX_DEPTH;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./metaforged.toml",
        "~/.config/metaforged/config.toml",
        "/etc/metaforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let cache = &config.cache;
    if cache.default_ttl_days == 0 {
        anyhow::bail!("cache.default_ttl_days cannot be 0");
    }
    if cache.negative_ttl_hours == 0 {
        anyhow::bail!("cache.negative_ttl_hours cannot be 0");
    }
    if cache.folder_index_ttl_days == 0 {
        anyhow::bail!("cache.folder_index_ttl_days cannot be 0");
    }
    if cache.negative_ttl_hours > cache.default_ttl_days * 24 {
        anyhow::bail!(
            "cache.negative_ttl_hours ({}) must not exceed default_ttl_days ({} days)",
            cache.negative_ttl_hours,
            cache.default_ttl_days
        );
    }
    if cache.pool_size == 0 {
        anyhow::bail!("cache.pool_size cannot be 0");
    }

    if config.rate_limit.poll_interval_ms == 0 {
        anyhow::bail!("rate_limit.poll_interval_ms cannot be 0");
    }

    if config.http.timeout_secs == 0 || config.http.timeout_secs > 60 {
        anyhow::bail!(
            "http.timeout_secs must be between 1 and 60, got {}",
            config.http.timeout_secs
        );
    }
    if config.http.requests_per_second == 0 {
        anyhow::bail!("http.requests_per_second cannot be 0");
    }

    let thresholds = &config.fuzzy.thresholds;
    if thresholds.is_empty() {
        anyhow::bail!("fuzzy.thresholds cannot be empty");
    }
    if let Some(bad) = thresholds.iter().find(|t| !(**t > 0.0 && **t <= 1.0)) {
        anyhow::bail!("fuzzy threshold {} is outside (0, 1]", bad);
    }
    if thresholds.windows(2).any(|w| w[1] >= w[0]) {
        anyhow::bail!("fuzzy.thresholds must be strictly descending");
    }
    if config.fuzzy.max_depth > MAX_DEPTH {
        anyhow::bail!(
            "fuzzy.max_depth {} exceeds the maximum of {}",
            config.fuzzy.max_depth,
            MAX_DEPTH
        );
    }

    if let Some(path) = cache.resolved_path() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tracing::warn!("Cache directory does not exist yet: {:?}", parent);
            }
        }
    }

    Ok(())
}
