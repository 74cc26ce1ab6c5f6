//! Configuration for pob-bridge
//!
//! Settings come from, in order of precedence: command-line flags, the
//! environment, the TOML config file, and built-in defaults. The config file
//! lives at `~/.config/pob-bridge/pob-bridge.toml` unless `POB_BRIDGE_CONFIG`
//! points elsewhere.

pub mod builds_locations;
mod errors;

pub use errors::ConfigError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "POB_BRIDGE_CONFIG";
/// Environment variable naming the calculation engine's root directory
pub const POB_PATH_ENV: &str = "POB_PATH";
/// Environment variable overriding the builds directory
pub const BUILDS_PATH_ENV: &str = "POB_BUILDS_PATH";
/// Folder under the user's documents directory owned by the engine
pub const DEFAULT_USER_FOLDER: &str = "Path of Building (PoE2)";

const APP_DIR: &str = "pob-bridge";
const CONFIG_FILE: &str = "pob-bridge.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pob_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builds_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_folder: Option<String>,
}

impl Config {
    /// Per-user directory holding the config and log files
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        #[cfg(not(target_os = "windows"))]
        let base = dirs::home_dir()
            .ok_or(ConfigError::NoHomeDirectory)?
            .join(".config");

        #[cfg(target_os = "windows")]
        let base = dirs::config_dir().ok_or(ConfigError::NoHomeDirectory)?;

        Ok(base.join(APP_DIR))
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        // Explicit override for tests and isolated runs
        if let Some(path) = non_empty_env(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::app_dir()?.join(CONFIG_FILE))
    }

    /// Load the config file; a missing file yields the defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Engine root: flag, then `POB_PATH`, then the config file, then the
    /// working directory
    pub fn pob_root(&self, cli: Option<&Path>) -> PathBuf {
        self.pob_root_with(cli, non_empty_env)
    }

    /// Explicit builds directory from flag, `POB_BUILDS_PATH` or the config
    /// file; `None` means auto-detect
    pub fn builds_override(&self, cli: Option<&Path>) -> Option<PathBuf> {
        self.builds_override_with(cli, non_empty_env)
    }

    pub fn user_folder(&self) -> &str {
        self.user_folder
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_USER_FOLDER)
    }

    fn pob_root_with(&self, cli: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| env(POB_PATH_ENV).map(PathBuf::from))
            .or_else(|| self.pob_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn builds_override_with(
        &self,
        cli: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<PathBuf> {
        cli.map(Path::to_path_buf)
            .or_else(|| env(BUILDS_PATH_ENV).map(PathBuf::from))
            .or_else(|| {
                self.builds_path
                    .as_ref()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from)
            })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
