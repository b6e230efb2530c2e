use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::CacheOptions;
use crate::constants::{
    APP_NAME, CONFIG_FILE, DEFAULT_MAX_SIZE_BYTES, DEFAULT_NAMESPACE, DEFAULT_VERSION,
    ENV_PREFIX, LOCAL_CONFIG_DIR,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Subdirectory of the storage root holding this cache
    pub namespace: String,

    /// Application version; a change discards every stored entry
    pub version: u32,

    /// Upper bound on the bytes held by stored values
    pub max_size_bytes: u64,

    /// Compress payloads with lz4
    pub compress: bool,

    /// Remove entries that no longer decode
    pub evict_corrupt: bool,

    /// Storage root candidates
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let options = CacheOptions::default();
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: DEFAULT_VERSION,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            compress: options.compress,
            evict_corrupt: options.evict_corrupt,
            storage: StorageConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            compress: self.compress,
            evict_corrupt: self.evict_corrupt,
        }
    }
}

/// Storage root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// External cache root, used when mounted and not removable
    pub external_dir: Option<PathBuf>,
    /// Whether the external root sits on removable media
    pub external_removable: bool,
    /// Internal cache root (defaults to the platform cache directory)
    pub internal_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            external_dir: None,
            external_removable: true,
            internal_dir: None,
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<CacheConfig> {
    load_config_from(None)
}

/// Load configuration, using `explicit` in place of the global file when given
pub fn load_config_from(explicit: Option<&Path>) -> Result<CacheConfig> {
    let local_config = PathBuf::from(LOCAL_CONFIG_DIR).join(CONFIG_FILE);

    // Build figment configuration
    let mut figment = Figment::from(Serialized::defaults(CacheConfig::default()));

    match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let global_config = get_config_dir()?.join(CONFIG_FILE);
            if global_config.exists() {
                figment = figment.merge(Toml::file(&global_config));
            }
            if local_config.exists() {
                figment = figment.merge(Toml::file(&local_config));
            }
        }
    }

    // Add environment variables (OBJCACHE_ prefix, nested keys split on __)
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        proj_dirs.config_dir().to_path_buf()
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        PathBuf::from(home).join(".config").join(APP_NAME)
    };
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Save configuration to file
pub fn save_config(config: &CacheConfig, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join(CONFIG_FILE)
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist.
///
/// Returns the path of the file.
pub fn init_config(path: Option<PathBuf>) -> Result<PathBuf> {
    let config_file = match path {
        Some(p) => p,
        None => get_config_dir()?.join(CONFIG_FILE),
    };

    if !config_file.exists() {
        save_config(&CacheConfig::default(), Some(config_file.clone()))?;
    }
    Ok(config_file)
}
