//! Platform-specific configuration paths.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/polysynth/` (Linux), `~/Library/Application Support/polysynth/` (macOS), `%APPDATA%\polysynth\` (Windows)
//! - **Config file**: `config.toml` inside the user config directory
//!
//! # Example
//!
//! ```rust,no_run
//! use polysynth_config::{EngineConfig, paths};
//!
//! let config = EngineConfig::load_or_default(paths::default_config_path()).unwrap();
//! println!("{} voices", config.max_voices);
//! ```

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "polysynth";

/// File name of the engine configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a relative fallback if the platform config directory cannot be
/// determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the engine configuration file in the user config directory.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Resolve an explicit config path, falling back to [`default_config_path`].
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(default_config_path, Path::to_path_buf)
}

/// Ensure the user config directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_dir() {
        let dir = user_config_dir();
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(path.parent().unwrap(), user_config_dir());
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(resolve_config_path(Some(explicit)), explicit);
        assert_eq!(resolve_config_path(None), default_config_path());
    }
}
