//! Default paths for the item session tools
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/qti-session/items.toml` or `~/.config/qti-session/items.toml`
//! - Data: `$XDG_DATA_HOME/qti-session` or `~/.local/share/qti-session`

use std::path::PathBuf;

/// Environment variable for overriding the item catalog path
pub const QTI_CONFIG_ENV: &str = "QTI_SESSION_CONFIG";

/// Environment variable for overriding the data directory
pub const QTI_DATA_DIR_ENV: &str = "QTI_SESSION_DATA_DIR";

/// Catalog filename within the config directory
const CONFIG_FILENAME: &str = "items.toml";

/// Database filename within the data directory
const DATABASE_FILENAME: &str = "sessions.db";

/// Application subdirectory name
const APP_DIR: &str = "qti-session";

/// Get the default item catalog path.
///
/// Order of precedence:
/// 1. `$QTI_SESSION_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/qti-session/items.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/qti-session/items.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(QTI_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$QTI_SESSION_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/qti-session` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/qti-session` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(QTI_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory from the XDG variables, ignoring the override.
fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Path of the session database inside a data directory
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILENAME)
}
