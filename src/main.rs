use anyhow::Result;
use clap::Parser;

use objcache::{
    app::{load_config_from, CacheConfig},
    cli::{handle_command, Cli, Commands},
    utils::init_logger,
};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Set up logging, chattier when verbose
    init_logger(if cli.verbose { "debug" } else { "warn" });

    // Init writes the config file, so it must not require one
    let config = match cli.command {
        Commands::Init => CacheConfig::default(),
        _ => load_config_from(cli.config.as_deref())?,
    };

    handle_command(&cli, config)
}
