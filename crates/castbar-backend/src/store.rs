//! Settings store implementations.

use std::fs;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use castbar_bridge::config::{Config, Preferences, SettingProperty};

use crate::config::{self, ConfigError};
use crate::network::local_ip_address;
use crate::settings::{SettingsError, SettingsStore};

const AUTOSTART_ENTRY: &str = "castbar.desktop";

/// Version of the installed application.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Settings store persisted in `config.toml`.
///
/// Every [`SettingsStore::set`] rewrites the file, so each property write is
/// independent of the others.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    autostart_dir: Option<PathBuf>,
    config: Config,
}

impl TomlSettingsStore {
    /// Opens (creating if needed) the configuration file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = config::load_config(&path)?;
        Ok(Self {
            path,
            autostart_dir: config::default_autostart_dir(),
            config,
        })
    }

    /// Opens `config.toml` in the user's configuration directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(config::default_config_path()?)
    }

    /// Places login items in `dir` instead of the platform location.
    #[must_use]
    pub fn with_autostart_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.autostart_dir = Some(dir.into());
        self
    }

    /// The configuration as last loaded or written.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn autostart_entry(executable: &Path) -> String {
        format!(
            "[Desktop Entry]\nType=Application\nName=castbar\nExec=\"{}\"\nX-GNOME-Autostart-enabled=true\n",
            executable.display()
        )
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, property: SettingProperty, default: i64) -> i64 {
        self.config.preferences.get(property).unwrap_or(default)
    }

    fn set(&mut self, property: SettingProperty, value: i64) -> Result<(), SettingsError> {
        let mut updated = self.config.clone();
        updated.preferences.set(property, value);
        config::save_config(&self.path, &updated)?;
        self.config = updated;
        Ok(())
    }

    fn set_start_at_login(&mut self, enabled: bool) -> Result<(), SettingsError> {
        let dir = self
            .autostart_dir
            .as_ref()
            .ok_or(SettingsError::Unsupported("start at login"))?;
        let entry = dir.join(AUTOSTART_ENTRY);

        if enabled {
            let executable = std::env::current_exe().map_err(SettingsError::Autostart)?;
            fs::create_dir_all(dir).map_err(SettingsError::Autostart)?;
            fs::write(&entry, Self::autostart_entry(&executable))
                .map_err(SettingsError::Autostart)?;
            log::info!("Registered login item at {entry:?}");
        } else {
            match fs::remove_file(&entry) {
                Ok(()) => log::info!("Removed login item at {entry:?}"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(SettingsError::Autostart(err)),
            }
        }

        Ok(())
    }

    fn ip_address(&self) -> IpAddr {
        local_ip_address()
    }

    fn version(&self) -> String {
        APP_VERSION.to_string()
    }

    fn renderer_path(&self) -> Option<PathBuf> {
        self.config.backend.renderer_path.clone()
    }
}

/// Volatile store for embedding the controller without a config file.
#[derive(Debug, Clone)]
pub struct MemorySettingsStore {
    preferences: Preferences,
    version: String,
    renderer_path: Option<PathBuf>,
    start_at_login: bool,
    fail_autostart: bool,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self {
            preferences: Preferences::default(),
            version: APP_VERSION.to_string(),
            renderer_path: None,
            start_at_login: false,
            fail_autostart: false,
        }
    }
}

impl MemorySettingsStore {
    /// Reports `version` as the installed version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_renderer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.renderer_path = Some(path.into());
        self
    }

    /// Makes login item registration fail, as on a platform without one.
    pub const fn fail_autostart(&mut self, fail: bool) {
        self.fail_autostart = fail;
    }

    /// Whether a login item is currently registered.
    pub const fn login_item_registered(&self) -> bool {
        self.start_at_login
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, property: SettingProperty, default: i64) -> i64 {
        self.preferences.get(property).unwrap_or(default)
    }

    fn set(&mut self, property: SettingProperty, value: i64) -> Result<(), SettingsError> {
        self.preferences.set(property, value);
        Ok(())
    }

    fn set_start_at_login(&mut self, enabled: bool) -> Result<(), SettingsError> {
        if self.fail_autostart {
            return Err(SettingsError::Unsupported("start at login"));
        }
        self.start_at_login = enabled;
        Ok(())
    }

    fn ip_address(&self) -> IpAddr {
        local_ip_address()
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn renderer_path(&self) -> Option<PathBuf> {
        self.renderer_path.clone()
    }
}
