//! Runtime configuration, read from the environment (`spec.md` §6).
//!
//! Every provider daemon and the registry daemon load their settings
//! through [`Config::from_env`]. There is no config file: the original
//! C++ service reads these same four variables directly, and carrying a
//! YAML layer here would add a concern the spec doesn't name.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// `SF_REGISTRY_IDLE_TIMEOUT` default, in seconds.
const DEFAULT_REGISTRY_IDLE_TIMEOUT_SECS: u64 = 30;
/// `SF_PROVIDER_IDLE_TIMEOUT` default, in seconds.
const DEFAULT_PROVIDER_IDLE_TIMEOUT_SECS: u64 = 30;
/// Default well-known registry object path.
const DEFAULT_REGISTRY_OBJECT_PATH: &str = "/com/canonical/StorageFramework/Registry";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
    #[error("STORAGE_FRAMEWORK_ROOT is set to '{0}' but that directory does not exist")]
    RootMissing(PathBuf),
    #[error("could not determine a default data directory (XDG_DATA_HOME unset and no home directory)")]
    NoDataDir,
}

/// An idle-shutdown timeout: either a bounded duration, or disabled
/// entirely (`0` in the environment means "never", `spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTimeout {
    Never,
    After(Duration),
}

impl IdleTimeout {
    fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            IdleTimeout::Never
        } else {
            IdleTimeout::After(Duration::from_secs(secs))
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            IdleTimeout::Never => None,
            IdleTimeout::After(d) => Some(*d),
        }
    }
}

/// Process-wide configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SF_REGISTRY_IDLE_TIMEOUT`.
    pub registry_idle_timeout: IdleTimeout,
    /// `SF_PROVIDER_IDLE_TIMEOUT`.
    pub provider_idle_timeout: IdleTimeout,
    /// `SF_REGISTRY_OBJECT_PATH`.
    pub registry_object_path: String,
    /// `STORAGE_FRAMEWORK_ROOT`, resolved to an absolute, existing directory.
    pub storage_framework_root: PathBuf,
}

impl Config {
    /// Load configuration from the process environment, validating each
    /// variable as it's read (`spec.md` §6).
    pub fn from_env() -> Result<Self, ConfigError> {
        let registry_idle_timeout = IdleTimeout::from_secs(read_timeout_secs(
            "SF_REGISTRY_IDLE_TIMEOUT",
            DEFAULT_REGISTRY_IDLE_TIMEOUT_SECS,
        )?);
        let provider_idle_timeout = IdleTimeout::from_secs(read_timeout_secs(
            "SF_PROVIDER_IDLE_TIMEOUT",
            DEFAULT_PROVIDER_IDLE_TIMEOUT_SECS,
        )?);
        let registry_object_path = env::var("SF_REGISTRY_OBJECT_PATH")
            .unwrap_or_else(|_| DEFAULT_REGISTRY_OBJECT_PATH.to_string());
        let storage_framework_root = resolve_storage_framework_root()?;

        Ok(Self {
            registry_idle_timeout,
            provider_idle_timeout,
            registry_object_path,
            storage_framework_root,
        })
    }
}

fn read_timeout_secs(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout { var, value }),
    }
}

/// Resolves `STORAGE_FRAMEWORK_ROOT`, falling back to
/// `${XDG_DATA_HOME}/storage-framework` (or `~/.local/share/storage-framework`)
/// when unset. Creates the `storage-framework` subfolder if the parent
/// directory exists but the subfolder doesn't (`spec.md` §6); the parent
/// itself must already exist.
fn resolve_storage_framework_root() -> Result<PathBuf, ConfigError> {
    if let Ok(root) = env::var("STORAGE_FRAMEWORK_ROOT") {
        let root = PathBuf::from(root);
        if !root.is_dir() {
            return Err(ConfigError::RootMissing(root));
        }
        return Ok(root);
    }

    let data_home = env::var("XDG_DATA_HOME").map(PathBuf::from).or_else(|_| {
        env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .map_err(|_| ConfigError::NoDataDir)
    })?;

    let root = data_home.join("storage-framework");
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|_| ConfigError::RootMissing(root.clone()))?;
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The environment is process-global; serialize tests that mutate it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn idle_timeout_zero_means_never() {
        assert_eq!(IdleTimeout::from_secs(0), IdleTimeout::Never);
        assert_eq!(
            IdleTimeout::from_secs(30),
            IdleTimeout::After(Duration::from_secs(30))
        );
    }

    #[test]
    fn timeout_defaults_to_thirty_seconds() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("SF_REGISTRY_IDLE_TIMEOUT");
        let secs = read_timeout_secs("SF_REGISTRY_IDLE_TIMEOUT", 30).unwrap();
        assert_eq!(secs, 30);
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SF_PROVIDER_IDLE_TIMEOUT", "not-a-number");
        let result = read_timeout_secs("SF_PROVIDER_IDLE_TIMEOUT", 30);
        env::remove_var("SF_PROVIDER_IDLE_TIMEOUT");
        assert!(result.is_err());
    }

    #[test]
    fn registry_object_path_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("SF_REGISTRY_OBJECT_PATH");
        let cfg_path = env::var("SF_REGISTRY_OBJECT_PATH")
            .unwrap_or_else(|_| DEFAULT_REGISTRY_OBJECT_PATH.to_string());
        assert_eq!(cfg_path, DEFAULT_REGISTRY_OBJECT_PATH);
    }

    #[test]
    fn explicit_root_must_exist() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("STORAGE_FRAMEWORK_ROOT", "/nonexistent/path/for/test");
        let result = resolve_storage_framework_root();
        env::remove_var("STORAGE_FRAMEWORK_ROOT");
        assert!(result.is_err());
    }

    #[test]
    fn explicit_root_is_used_when_it_exists() {
        let _guard = ENV_LOCK.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_var("STORAGE_FRAMEWORK_ROOT", tmp.path());
        let root = resolve_storage_framework_root().unwrap();
        env::remove_var("STORAGE_FRAMEWORK_ROOT");
        assert_eq!(root, tmp.path());
    }
}
