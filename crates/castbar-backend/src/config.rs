use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use castbar_bridge::config::Config;
use directories::{BaseDirs, ProjectDirs};

// TODO: add migrations for config files once a field is renamed.

/// Errors that can occur while loading or resolving application configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to determine the user's configuration directories. This usually
    /// occurs when required environment variables are missing (e.g., `$HOME`
    /// on Unix or `%APPDATA%` on Windows).
    #[error("failed to obtain user's directories")]
    DirectoriesNotFound,
    /// An I/O error occurred while reading or writing the configuration file.
    #[error("failed to access config: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid TOML or does not match the
    /// expected structure.
    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),
    /// Failed to serialize the configuration to TOML.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Path of `config.toml` in the user's configuration directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("io", "castbar", "castbar")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::DirectoriesNotFound)
}

/// Directory desktop sessions scan for autostart entries, where the platform
/// has one.
pub(crate) fn default_autostart_dir() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        BaseDirs::new().map(|dirs| dirs.config_dir().join("autostart"))
    } else {
        None
    }
}

/// Loads the configuration at `path`. A missing file is created with the
/// default configuration.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    log::info!("Loading configuration from {path:?}");
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        return Ok(config);
    }

    let config = Config::default();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(&config)?;
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;

    Ok(config)
}

/// Serializes `config` to pretty-printed TOML and writes it to `path`,
/// overwriting any existing file.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;

    Ok(())
}
