/// Constants module to avoid magic numbers in the codebase

// Naming
pub const APP_NAME: &str = "objcache";
pub const ENV_PREFIX: &str = "OBJCACHE_";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOCAL_CONFIG_DIR: &str = ".objcache";

// Cache defaults
pub const DEFAULT_NAMESPACE: &str = "objects";
pub const DEFAULT_VERSION: u32 = 1;
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024; // 10MB

// Payload codec
pub const CODEC_TAG_PLAIN: u8 = 0;
pub const CODEC_TAG_LZ4: u8 = 1;
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024; // 256MB
