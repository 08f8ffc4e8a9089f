//! Configuration and file locations for the hoster API client
//!
//! This crate provides:
//! - File path utilities for config and cache files
//! - Configuration file loading (TOML)
//! - Application configuration (AppConfig) with the response cache settings

pub mod app_config;
pub mod config_file;
pub mod paths;

pub use app_config::{AppConfig, BackendKind, CacheModeSetting, CacheSettings};
pub use config_file::{load_config_file, ConfigSource, CONFIG_ENV};
pub use paths::{api_cache_path, cache_dir, config_dir};
