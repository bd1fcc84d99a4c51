//! Configuration for the game history
//!
//! Handles data directory configuration with the following precedence:
//! 1. GAME_HISTORY_DATA_DIR environment variable
//! 2. ~/.config/game-history/data (production default)
//! 3. ./data (fallback for development)

use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "GAME_HISTORY_DATA_DIR";
const DEFAULT_CONFIG_DIR: &str = ".config/game-history/data";
const DEV_DATA_DIR: &str = "./data";

/// File name of the record database inside the data directory.
pub const DATABASE_FILE: &str = "game_record.db";

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    resolve_data_dir(
        std::env::var(DATA_DIR_ENV).ok(),
        std::env::var("HOME").ok(),
    )
}

fn resolve_data_dir(explicit: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = home {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Path of the record database, honouring an explicit override.
pub fn database_path(override_path: Option<&Path>) -> PathBuf {
    match override_path {
        Some(path) => path.to_path_buf(),
        None => get_data_dir().join(DATABASE_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = resolve_data_dir(Some("/tmp/games".into()), Some("/home/me".into()));
        assert_eq!(dir, PathBuf::from("/tmp/games"));
    }

    #[test]
    fn test_home_default() {
        let dir = resolve_data_dir(None, Some("/home/me".into()));
        assert_eq!(dir, PathBuf::from("/home/me/.config/game-history/data"));
        let dir = resolve_data_dir(Some(String::new()), Some("/home/me".into()));
        assert_eq!(dir, PathBuf::from("/home/me/.config/game-history/data"));
    }

    #[test]
    fn test_dev_fallback() {
        assert_eq!(resolve_data_dir(None, None), PathBuf::from("./data"));
    }

    #[test]
    fn test_database_path_override() {
        let path = database_path(Some(Path::new("/tmp/x.db")));
        assert_eq!(path, PathBuf::from("/tmp/x.db"));
        assert!(database_path(None).ends_with(DATABASE_FILE));
    }
}
