//! Configuration and cache directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/hoster/`, `~/.cache/hoster/`
//! - macOS: `~/Library/Application Support/hoster/`, `~/Library/Caches/hoster/`
//! - Windows: `%APPDATA%\hoster\`, `%LOCALAPPDATA%\hoster\`

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "hoster";

/// Get the application config directory
///
/// Only looked up, never created; config files are optional.
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get the application cache directory
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine cache directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get path to the persisted API response cache
pub fn api_cache_path() -> Result<PathBuf> {
    Ok(cache_dir()?.join("api-cache.json"))
}
