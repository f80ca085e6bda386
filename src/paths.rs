//! Centralized path resolution for fleetform
//!
//! # Environment Variables
//!
//! - `FLEETFORM_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/fleetform`)
//! - `FLEETFORM_SPECS_DIR` - Replace the spec search path with a single directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `FLEETFORM_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/fleetform` (if set)
//! 3. `~/.config/fleetform`
//!
//! For spec_dirs(), unless `FLEETFORM_SPECS_DIR` is set, in order:
//! 1. `<config_dir>/specs`
//! 2. `/etc/fleetform/specs`
//! 3. `./specs`
//! 4. `~/fleetform/specs`
//! 5. Extra directories from `[settings] spec_dirs` in `hosts.toml`
//!
//! Later directories win when two define the same spec.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "FLEETFORM_CONFIG_DIR";

/// Environment variable for spec directory override
pub const ENV_SPECS_DIR: &str = "FLEETFORM_SPECS_DIR";

/// Inventory file name inside the config directory
pub const HOSTS_FILE: &str = "hosts.toml";

/// System-wide spec directory
pub const SYSTEM_SPECS_DIR: &str = "/etc/fleetform/specs";

/// Get the fleetform config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("fleetform");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("fleetform");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path to the host inventory
pub fn hosts_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(HOSTS_FILE))
}

/// Directories searched for spec definitions, lowest precedence first
///
/// Directories are not required to exist.
pub fn spec_dirs(extra: &[String]) -> Result<Vec<PathBuf>> {
    if let Ok(dir) = std::env::var(ENV_SPECS_DIR) {
        let path = expand(&dir);
        log::debug!("Using specs dir from {}: {}", ENV_SPECS_DIR, path.display());
        return Ok(vec![path]);
    }

    Ok(search_path(&config_dir()?, dirs::home_dir(), extra))
}

fn search_path(config_dir: &Path, home: Option<PathBuf>, extra: &[String]) -> Vec<PathBuf> {
    let mut dirs = vec![
        config_dir.join("specs"),
        PathBuf::from(SYSTEM_SPECS_DIR),
        PathBuf::from("specs"),
    ];
    if let Some(home) = home {
        dirs.push(home.join("fleetform").join("specs"));
    }
    dirs.extend(extra.iter().map(|dir| expand(dir)));
    dirs
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    #[test]
    fn test_config_dir_resolution() {
        with_env_var(ENV_CONFIG_DIR, "/custom/fleetform", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/fleetform"));
            assert_eq!(
                hosts_file().unwrap(),
                PathBuf::from("/custom/fleetform/hosts.toml")
            );
        });

        without_env_var(ENV_CONFIG_DIR, || {
            with_env_var("XDG_CONFIG_HOME", "/tmp/xdg-fleetform-test", || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-fleetform-test/fleetform")
                );
            });
        });
    }

    #[test]
    fn test_spec_dirs_override() {
        with_env_var(ENV_SPECS_DIR, "/srv/specs", || {
            let dirs = spec_dirs(&["/ignored".into()]).unwrap();
            assert_eq!(dirs, vec![PathBuf::from("/srv/specs")]);
        });
    }

    #[test]
    fn test_search_path_order() {
        let dirs = search_path(
            Path::new("/cfg"),
            Some(PathBuf::from("/home/ops")),
            &["/opt/specs".into()],
        );
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/cfg/specs"),
                PathBuf::from(SYSTEM_SPECS_DIR),
                PathBuf::from("specs"),
                PathBuf::from("/home/ops/fleetform/specs"),
                PathBuf::from("/opt/specs"),
            ]
        );
    }

    #[test]
    fn test_search_path_without_home() {
        let dirs = search_path(Path::new("/cfg"), None, &[]);
        assert_eq!(dirs.len(), 3);
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/fleet");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("fleet"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_FLEETFORM_VAR/file");
        assert_eq!(
            result,
            PathBuf::from("/path/$NONEXISTENT_FLEETFORM_VAR/file")
        );
    }
}
