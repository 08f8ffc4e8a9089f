//! Application configuration
//!
//! Configuration loaded from `.hoster.toml`:
//!
//! ```toml
//! [cache]
//! backend = "file"       # "memory" (default) or "file"
//! size_limit = 50000     # memory backend only
//! ttl_secs = 300         # omit to keep entries until evicted
//! mode = "read_write"    # "none", "write_only", "read_only", "read_write"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which store backs the response cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Bounded in-process map
    #[default]
    Memory,
    /// JSON file in the cache directory
    File,
}

/// How clients use the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheModeSetting {
    None,
    WriteOnly,
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: BackendKind,

    /// Maximum number of entries of the memory backend
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,

    /// Expiry applied to every write
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    #[serde(default)]
    pub mode: CacheModeSetting,

    /// Overrides the file backend location (default: cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_size_limit() -> usize {
    1_000_000 // a million entries
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            size_limit: default_size_limit(),
            ttl_secs: None,
            mode: CacheModeSetting::default(),
            file: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<std::time::Duration> {
        self.ttl_secs.map(std::time::Duration::from_secs)
    }
}

/// Application configuration loaded from .hoster.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheSettings,
}

impl AppConfig {
    /// Load `.env`, then the config from CWD or home directory, or use defaults
    ///
    /// `.env` is only read to populate hoster tokens in the environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Failed to load .env file: {}", e),
        }

        if let Some(source) = crate::load_config_file() {
            match toml::from_str(&source.content) {
                Ok(config) => {
                    log::info!("Loaded app config from {}", source.path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse config file {}: {}",
                        source.path.display(),
                        e
                    );
                }
            }
        }

        log::debug!("Using default app config");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache.backend, BackendKind::Memory);
        assert_eq!(config.cache.size_limit, 1_000_000);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.cache.mode, CacheModeSetting::ReadWrite);
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [cache]
            backend = "file"
            ttl_secs = 300
            mode = "write_only"
            file = "/tmp/hoster.json"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.backend, BackendKind::File);
        assert_eq!(
            config.cache.ttl(),
            Some(std::time::Duration::from_secs(300))
        );
        assert_eq!(config.cache.mode, CacheModeSetting::WriteOnly);
        assert_eq!(config.cache.file, Some(PathBuf::from("/tmp/hoster.json")));
        // size_limit should use default
        assert_eq!(config.cache.size_limit, 1_000_000);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_rejects_unknown_backend() {
        let toml = r#"
            [cache]
            backend = "redis"
        "#;
        assert!(toml::from_str::<AppConfig>(toml).is_err());
    }
}
