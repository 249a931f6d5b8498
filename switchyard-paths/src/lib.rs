//! XDG Base Directory paths for switchyard.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the switchyard config directory.
///
/// Returns `$XDG_CONFIG_HOME/switchyard` if set, otherwise
/// `~/.config/switchyard`. This is where config files and stored
/// credentials live.
///
/// # Examples
///
/// ```
/// use switchyard_paths::config_dir;
///
/// let config = config_dir();
/// let auth_file = config.join("auth.json");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("switchyard")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/switchyard")
    } else {
        PathBuf::from(".config/switchyard")
    }
}

/// Get the switchyard cache directory.
///
/// Returns `$XDG_CACHE_HOME/switchyard` if set, otherwise
/// `~/.cache/switchyard`. This is where the catalog snapshot and
/// provisioned backend modules are stored.
///
/// # Examples
///
/// ```
/// use switchyard_paths::cache_dir;
///
/// let cache = cache_dir();
/// let snapshot = cache.join("models.json");
/// ```
pub fn cache_dir() -> PathBuf {
    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg_cache).join("switchyard")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cache/switchyard")
    } else {
        PathBuf::from(".cache/switchyard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_switchyard() {
        let path = config_dir();
        assert!(
            path.ends_with("switchyard"),
            "config_dir should end with 'switchyard'"
        );
    }

    #[test]
    fn test_cache_dir_ends_with_switchyard() {
        let path = cache_dir();
        assert!(
            path.ends_with("switchyard"),
            "cache_dir should end with 'switchyard'"
        );
    }

    #[test]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-config/switchyard"));
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    fn test_cache_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", "/tmp/test-cache");
        }
        let path = cache_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-cache/switchyard"));
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
    }
}
