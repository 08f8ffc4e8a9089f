//! Locating the configuration file

use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = ".hoster.toml";

/// Env var naming an explicit config file
pub const CONFIG_ENV: &str = "HOSTER_CONFIG";

/// A config file that was found and read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub content: String,
}

/// Candidate locations, most specific first:
/// 1. `$HOSTER_CONFIG`
/// 2. `.hoster.toml` in the current working directory
/// 3. `config.toml` in the config directory (`~/.config/hoster/` on Linux)
/// 4. `~/.hoster.toml`
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    if let Ok(dir) = crate::paths::config_dir() {
        paths.push(dir.join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_FILE));
    }

    paths
}

/// Read the first existing config file
pub fn load_config_file() -> Option<ConfigSource> {
    load_first(&candidate_paths())
}

fn load_first(paths: &[PathBuf]) -> Option<ConfigSource> {
    paths.iter().find_map(|path| read(path))
}

fn read(path: &Path) -> Option<ConfigSource> {
    let content = std::fs::read_to_string(path).ok()?;
    log::debug!("Loaded config from {}", path.display());
    Some(ConfigSource {
        path: path.to_path_buf(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_existing_file_wins() {
        let dir = std::env::temp_dir().join(format!("hoster-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let missing = dir.join("missing.toml");
        let first = dir.join("first.toml");
        let second = dir.join("second.toml");
        std::fs::write(&first, "[cache]\nttl_secs = 1\n").unwrap();
        std::fs::write(&second, "[cache]\nttl_secs = 2\n").unwrap();

        let source = load_first(&[missing, first.clone(), second]).unwrap();
        assert_eq!(source.path, first);
        assert!(source.content.contains("ttl_secs = 1"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(load_first(&[PathBuf::from("/nonexistent/hoster.toml")]), None);
    }

    #[test]
    fn test_cwd_file_is_a_candidate() {
        assert!(candidate_paths().contains(&PathBuf::from(CONFIG_FILE)));
    }

    #[test]
    fn test_config_dir_is_a_candidate() {
        if let Ok(dir) = crate::paths::config_dir() {
            assert!(candidate_paths().contains(&dir.join("config.toml")));
        }
    }
}
