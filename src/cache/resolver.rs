use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::app::StorageConfig;
use crate::constants::APP_NAME;

/// Picks the root directory a cache namespace lives under
pub trait RootDirResolver {
    /// `None` when no usable directory exists
    fn resolve_root(&self) -> Option<PathBuf>;
}

impl RootDirResolver for Path {
    fn resolve_root(&self) -> Option<PathBuf> {
        Some(self.to_path_buf())
    }
}

impl RootDirResolver for PathBuf {
    fn resolve_root(&self) -> Option<PathBuf> {
        Some(self.clone())
    }
}

/// External storage candidate, such as a mounted card or volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalStorage {
    pub path: PathBuf,
    pub mounted: bool,
    pub removable: bool,
}

/// Candidate roots for the cache.
///
/// External storage wins only when it is mounted and not removable; the
/// internal directory is used otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageRoots {
    pub external: Option<ExternalStorage>,
    pub internal: Option<PathBuf>,
}

impl StorageRoots {
    pub fn from_config(config: &StorageConfig) -> Self {
        let external = config.external_dir.as_ref().map(|path| ExternalStorage {
            path: path.clone(),
            mounted: path.is_dir(),
            removable: config.external_removable,
        });
        let internal = config.internal_dir.clone().or_else(default_cache_dir);

        Self { external, internal }
    }
}

impl RootDirResolver for StorageRoots {
    fn resolve_root(&self) -> Option<PathBuf> {
        match &self.external {
            Some(external) if external.mounted && !external.removable => {
                Some(external.path.clone())
            }
            _ => self.internal.clone(),
        }
    }
}

/// Platform cache directory (~/.cache/objcache on Linux, ~/Library/Caches/objcache on macOS)
pub fn default_cache_dir() -> Option<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        return Some(proj_dirs.cache_dir().to_path_buf());
    }
    // Fallback to ~/.cache/objcache
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".cache").join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn external(mounted: bool, removable: bool) -> Option<ExternalStorage> {
        Some(ExternalStorage {
            path: PathBuf::from("/mnt/ext"),
            mounted,
            removable,
        })
    }

    #[test]
    fn test_external_used_when_mounted_and_fixed() {
        let roots = StorageRoots {
            external: external(true, false),
            internal: Some(PathBuf::from("/data/cache")),
        };
        assert_eq!(roots.resolve_root(), Some(PathBuf::from("/mnt/ext")));
    }

    #[test]
    fn test_internal_fallback() {
        for ext in [external(false, false), external(true, true), external(false, true), None] {
            let roots = StorageRoots {
                external: ext,
                internal: Some(PathBuf::from("/data/cache")),
            };
            assert_eq!(roots.resolve_root(), Some(PathBuf::from("/data/cache")));
        }
    }

    #[test]
    fn test_nothing_resolvable() {
        let roots = StorageRoots {
            external: external(false, true),
            internal: None,
        };
        assert_eq!(roots.resolve_root(), None);
    }

    #[test]
    fn test_from_config_checks_mount() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            external_dir: Some(temp_dir.path().to_path_buf()),
            external_removable: false,
            internal_dir: Some(PathBuf::from("/data/cache")),
        };
        let roots = StorageRoots::from_config(&config);
        assert_eq!(roots.resolve_root(), Some(temp_dir.path().to_path_buf()));

        let config = StorageConfig {
            external_dir: Some(temp_dir.path().join("not-mounted")),
            ..config
        };
        let roots = StorageRoots::from_config(&config);
        assert_eq!(roots.resolve_root(), Some(PathBuf::from("/data/cache")));
    }
}
