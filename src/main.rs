mod cli;

use metaforged::{
    config,
    fuzzy::LocalFilesystem,
    metadata::ProviderRegistry,
    service::MetadataService,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CacheCommand, Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "metaforged=trace,metaforged_db=debug,metaforged_common=debug".to_string()
        } else {
            "metaforged=warn,metaforged_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Cache { action } => run_cache(action, cli.config.as_deref()),
        Commands::Match { parent, name } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(match_folder(&parent, &name, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("metaforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_service(config_path: Option<&Path>) -> Result<MetadataService> {
    let config = config::load_config_or_default(config_path)?;
    let service = MetadataService::open(config, ProviderRegistry::new(), Arc::new(LocalFilesystem))
        .context("Failed to open metadata cache")?;
    Ok(service)
}

fn run_cache(action: CacheCommand, config_path: Option<&Path>) -> Result<()> {
    let service = open_service(config_path)?;

    match action {
        CacheCommand::Get { key, checksum } => {
            match service.get_cached::<serde_json::Value>(&key, checksum.as_deref()) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("miss"),
            }
        }
        CacheCommand::Set {
            key,
            json,
            ttl_secs,
            checksum,
        } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("Value is not valid JSON")?;
            service.set_cached(
                &key,
                &value,
                ttl_secs.map(Duration::from_secs),
                checksum.as_deref(),
            );
            println!("stored {key}");
        }
        CacheCommand::Remove { key } => {
            if service.invalidate(&key) {
                println!("removed {key}");
            } else {
                println!("not cached: {key}");
            }
        }
        CacheCommand::Purge => {
            let removed = service.cache().purge_expired();
            println!("purged {removed} expired entries");
        }
        CacheCommand::Stats => {
            let stats = service.stats();
            println!("Entries: {}", stats.entries);
            println!("Expired: {}", stats.expired);
        }
    }

    service.close();
    Ok(())
}

async fn match_folder(parent: &str, name: &str, config_path: Option<&Path>) -> Result<()> {
    let service = open_service(config_path)?;
    let found = service.resolve_folder(parent, name).await;
    service.close();

    match found {
        Some(path) => println!("{path}"),
        None => anyhow::bail!("No match for {:?} in {}", name, parent),
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let cache_path = config
        .cache
        .resolved_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "in-memory".to_string());
    println!("  Cache: {}", cache_path);
    println!(
        "  TTL: {} days (negative {} hours)",
        config.cache.default_ttl_days, config.cache.negative_ttl_hours
    );
    println!(
        "  Rate limit: {} polls x {}ms, cool-down {}ms",
        config.rate_limit.max_polls, config.rate_limit.poll_interval_ms, config.rate_limit.cooldown_ms
    );
    println!("  Fuzzy thresholds: {:?}", config.fuzzy.thresholds);
    Ok(())
}
