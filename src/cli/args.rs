use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "objcache")]
#[command(version)]
#[command(about = "Inspect and manage an on-disk object cache", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cache directory to open (skips storage root resolution)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Namespace under the resolved storage root
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Application version the cache was written with
    #[arg(long = "app-version")]
    pub app_version: Option<u32>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init,
    /// Show cache statistics
    Info,
    /// Check whether a key is present
    Contains { key: String },
    /// Print a string value
    Get { key: String },
    /// Store a string value
    Put { key: String, value: String },
    /// Remove a single key
    Remove { key: String },
    /// Delete every entry
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}
