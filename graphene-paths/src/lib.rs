//! XDG Base Directory paths for graphene.
//!
//! The host process keeps its configuration, extension binaries and log
//! files under XDG paths on every platform, so a user can find them in the
//! same place regardless of OS.

use std::path::PathBuf;

/// Resolve `$<var>/graphene`, falling back to `~/<home_suffix>/graphene`.
fn xdg_dir(var: &str, home_suffix: &str) -> PathBuf {
    if let Ok(base) = std::env::var(var)
        && !base.is_empty()
    {
        PathBuf::from(base).join("graphene")
    } else if let Some(home) = dirs::home_dir() {
        home.join(home_suffix).join("graphene")
    } else {
        PathBuf::from(home_suffix).join("graphene")
    }
}

/// Get the graphene config directory.
///
/// Returns `$XDG_CONFIG_HOME/graphene` if set, otherwise `~/.config/graphene`.
///
/// # Examples
///
/// ```
/// use graphene_paths::config_dir;
///
/// let config_file = config_dir().join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the graphene data directory.
///
/// Returns `$XDG_DATA_HOME/graphene` if set, otherwise `~/.local/share/graphene`.
/// Extension modules are installed under `extensions/` here.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Get the graphene state directory (log files).
///
/// Returns `$XDG_STATE_HOME/graphene` if set, otherwise `~/.local/state/graphene`.
pub fn state_dir() -> PathBuf {
    xdg_dir("XDG_STATE_HOME", ".local/state")
}

/// Default directory scanned for extension modules.
pub fn extensions_dir() -> PathBuf {
    data_dir().join("extensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_ends_with_graphene() {
        let path = config_dir();
        assert!(
            path.ends_with("graphene"),
            "config_dir should end with 'graphene'"
        );
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-config/graphene"));
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    #[serial]
    fn test_empty_xdg_var_falls_back_to_home() {
        unsafe {
            std::env::set_var("XDG_STATE_HOME", "");
        }
        let path = state_dir();
        assert!(path.ends_with(".local/state/graphene"));
        unsafe {
            std::env::remove_var("XDG_STATE_HOME");
        }
    }

    #[test]
    #[serial]
    fn test_extensions_dir_is_under_data_dir() {
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "/tmp/test-data");
        }
        assert_eq!(
            extensions_dir(),
            PathBuf::from("/tmp/test-data/graphene/extensions")
        );
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
    }
}
