use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

use crate::{
    app::{init_config, CacheConfig},
    cache::{Lookup, ObjectCache},
};

use super::{Cli, Commands, OutputFormat};

/// Open the cache selected by the CLI flags on top of the loaded configuration
pub fn open_cache(cli: &Cli, mut config: CacheConfig) -> Result<ObjectCache> {
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(version) = cli.app_version {
        config.version = version;
    }

    let cache = match &cli.dir {
        Some(dir) => ObjectCache::open_in(
            dir,
            config.version,
            config.max_size_bytes,
            config.options(),
        ),
        None => ObjectCache::from_config(&config),
    };
    cache.context("Failed to open cache")
}

/// Handle CLI subcommands
pub fn handle_command(cli: &Cli, config: CacheConfig) -> Result<()> {
    // Init runs without a cache; every other command opens one
    let open = move || open_cache(cli, config);

    let cache = match &cli.command {
        Commands::Init => {
            let path = init_config(cli.config.clone())?;
            emit(
                cli.format,
                format!("Configuration at: {}", path.display()),
                json!({ "config": path }),
            );
            return Ok(());
        }
        Commands::Info => {
            let cache = open()?;
            let stats = cache.stats();
            match cli.format {
                OutputFormat::Text => println!("{}", stats.format()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            }
            cache
        }
        Commands::Contains { key } => {
            let cache = open()?;
            let present = cache.contains_key(key)?;
            let text = if present {
                format!("{} {}", "present".green(), key)
            } else {
                format!("{} {}", "missing".yellow(), key)
            };
            emit(cli.format, text, json!({ "key": key, "present": present }));
            cache
        }
        Commands::Get { key } => {
            let cache = open()?;
            match cache.lookup::<String>(key)? {
                Lookup::Hit(value) => {
                    emit(cli.format, value.clone(), json!({ "key": key, "value": value }));
                }
                Lookup::Miss => emit(
                    cli.format,
                    format!("{} {}", "miss".yellow(), key),
                    json!({ "key": key, "value": null }),
                ),
                Lookup::Corrupt(reason) => emit(
                    cli.format,
                    format!("{} {}: {}", "undecodable".red(), key, reason),
                    json!({ "key": key, "value": null, "error": reason }),
                ),
            }
            cache
        }
        Commands::Put { key, value } => {
            let cache = open()?;
            cache.put(key, value.as_str())?;
            emit(
                cli.format,
                format!("{} {}", "stored".green(), key),
                json!({ "key": key, "stored": true }),
            );
            cache
        }
        Commands::Remove { key } => {
            let cache = open()?;
            let removed = cache.remove(key)?;
            let text = if removed {
                format!("{} {}", "removed".green(), key)
            } else {
                format!("{} {}", "missing".yellow(), key)
            };
            emit(cli.format, text, json!({ "key": key, "removed": removed }));
            cache
        }
        Commands::Clear => {
            let cache = open()?;
            cache.clear_cache()?;
            emit(
                cli.format,
                format!("{} {}", "cleared".green(), cache.cache_folder().display()),
                json!({ "cleared": cache.cache_folder() }),
            );
            cache
        }
    };

    cache.close()?;
    Ok(())
}

fn emit(format: OutputFormat, text: String, value: serde_json::Value) {
    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => println!("{}", value),
    }
}
