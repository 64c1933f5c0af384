//! Typed settings and the in-memory mirror the controller reads them through.
//!
//! The [`SettingsStore`] trait abstracts over where preferences live. The
//! [`SettingsMirror`] reads them once into a [`SettingsSnapshot`] and proxies
//! every write back to the store before updating its own copy, so a value
//! returned by a getter has always been persisted.

use std::net::IpAddr;
use std::path::PathBuf;

use castbar_bridge::config::{
    PlayerHardwareDecode, PlayerPosition, PlayerPreferences, PlayerSize, SettingProperty,
};

use crate::config::ConfigError;

/// Errors reported by settings writes.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Persisting the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Registering or removing the login item failed.
    #[error("failed to update login item: {0}")]
    Autostart(#[source] std::io::Error),
    /// The platform offers no way to do what was asked.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// A key/integer preference store with a few platform accessors.
pub trait SettingsStore: Send {
    /// Stored value of `property`, or `default` when nothing is stored.
    fn get(&self, property: SettingProperty, default: i64) -> i64;

    /// Stores and immediately persists `value` for `property`.
    fn set(&mut self, property: SettingProperty, value: i64) -> Result<(), SettingsError>;

    /// Registers (or removes) the application as a login item.
    fn set_start_at_login(&mut self, enabled: bool) -> Result<(), SettingsError>;

    /// Address the backend is reachable at on the local network.
    fn ip_address(&self) -> IpAddr;

    /// Version of the installed application.
    fn version(&self) -> String;

    /// Renderer executable, if one is configured.
    fn renderer_path(&self) -> Option<PathBuf>;
}

/// Preferences as read from the store at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub start_at_login: bool,
    pub check_update_on_startup: bool,
    pub player_size: PlayerSize,
    pub player_position: PlayerPosition,
    pub player_hardware_decode: PlayerHardwareDecode,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            start_at_login: false,
            check_update_on_startup: true,
            player_size: PlayerSize::default(),
            player_position: PlayerPosition::default(),
            player_hardware_decode: PlayerHardwareDecode::default(),
        }
    }
}

fn read(store: &dyn SettingsStore, property: SettingProperty) -> i64 {
    store.get(property, property.default_value())
}

fn read_enum<T: Default + Copy>(
    store: &dyn SettingsStore,
    property: SettingProperty,
    parse: fn(i64) -> Option<T>,
) -> T {
    let value = read(store, property);
    parse(value).unwrap_or_else(|| {
        log::warn!("Ignoring out-of-range value {value} for {property:?}");
        T::default()
    })
}

impl SettingsSnapshot {
    /// Reads every preference from `store`, replacing invalid values with
    /// their defaults.
    pub fn read_from(store: &dyn SettingsStore) -> Self {
        Self {
            start_at_login: read(store, SettingProperty::StartAtLogin) != 0,
            check_update_on_startup: read(store, SettingProperty::CheckUpdate) != 0,
            player_size: read_enum(store, SettingProperty::PlayerSize, PlayerSize::from_index),
            player_position: read_enum(
                store,
                SettingProperty::PlayerPosition,
                PlayerPosition::from_index,
            ),
            player_hardware_decode: read_enum(
                store,
                SettingProperty::PlayerHW,
                PlayerHardwareDecode::from_index,
            ),
        }
    }
}

/// Write-through mirror of the settings store.
pub struct SettingsMirror {
    store: Box<dyn SettingsStore>,
    snapshot: SettingsSnapshot,
}

impl SettingsMirror {
    /// Wraps `store`. Until [`SettingsMirror::load`] is called the mirror
    /// reports default values.
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store,
            snapshot: SettingsSnapshot::default(),
        }
    }

    /// Reads every preference from the store into the mirror.
    pub fn load(&mut self) {
        self.snapshot = SettingsSnapshot::read_from(self.store.as_ref());
        log::debug!("Loaded settings: {:?}", self.snapshot);
    }

    pub const fn snapshot(&self) -> &SettingsSnapshot {
        &self.snapshot
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub const fn start_at_login(&self) -> bool {
        self.snapshot.start_at_login
    }

    pub const fn check_update_on_startup(&self) -> bool {
        self.snapshot.check_update_on_startup
    }

    pub const fn player_size(&self) -> PlayerSize {
        self.snapshot.player_size
    }

    pub const fn player_position(&self) -> PlayerPosition {
        self.snapshot.player_position
    }

    pub const fn player_hardware_decode(&self) -> PlayerHardwareDecode {
        self.snapshot.player_hardware_decode
    }

    /// The player preferences the renderer should run with.
    pub const fn player_preferences(&self) -> PlayerPreferences {
        PlayerPreferences {
            size: self.snapshot.player_size,
            position: self.snapshot.player_position,
            hardware_decode: self.snapshot.player_hardware_decode,
        }
    }

    /// Registers or removes the login item, then persists the preference.
    /// Nothing is persisted when the registration fails.
    pub fn set_start_at_login(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.store.set_start_at_login(enabled)?;
        self.store
            .set(SettingProperty::StartAtLogin, i64::from(enabled))?;
        self.snapshot.start_at_login = enabled;
        Ok(())
    }

    /// Re-applies the stored login item preference to the platform.
    pub fn reapply_start_at_login(&mut self) -> Result<(), SettingsError> {
        self.store.set_start_at_login(self.snapshot.start_at_login)
    }

    pub fn set_check_update_on_startup(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.store
            .set(SettingProperty::CheckUpdate, i64::from(enabled))?;
        self.snapshot.check_update_on_startup = enabled;
        Ok(())
    }

    pub fn set_player_size(&mut self, size: PlayerSize) -> Result<(), SettingsError> {
        self.store.set(SettingProperty::PlayerSize, size.index())?;
        self.snapshot.player_size = size;
        Ok(())
    }

    pub fn set_player_position(&mut self, position: PlayerPosition) -> Result<(), SettingsError> {
        self.store
            .set(SettingProperty::PlayerPosition, position.index())?;
        self.snapshot.player_position = position;
        Ok(())
    }

    pub fn set_player_hardware_decode(
        &mut self,
        decode: PlayerHardwareDecode,
    ) -> Result<(), SettingsError> {
        self.store.set(SettingProperty::PlayerHW, decode.index())?;
        self.snapshot.player_hardware_decode = decode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::store::{MemorySettingsStore, TomlSettingsStore};

    #[test]
    fn unloaded_mirror_reports_defaults() {
        let mut store = MemorySettingsStore::default();
        store.set(SettingProperty::PlayerSize, 4).unwrap();
        let mirror = SettingsMirror::new(Box::new(store));

        assert_eq!(*mirror.snapshot(), SettingsSnapshot::default());
    }

    #[test]
    fn load_reads_stored_values() {
        let mut store = MemorySettingsStore::default();
        store.set(SettingProperty::CheckUpdate, 0).unwrap();
        store.set(SettingProperty::PlayerSize, 4).unwrap();
        store.set(SettingProperty::PlayerHW, 2).unwrap();

        let mut mirror = SettingsMirror::new(Box::new(store));
        mirror.load();

        assert!(!mirror.check_update_on_startup());
        assert_eq!(mirror.player_size(), PlayerSize::Fullscreen);
        assert_eq!(mirror.player_position(), PlayerPosition::RightTop);
        assert_eq!(
            mirror.player_hardware_decode(),
            PlayerHardwareDecode::ForceDedicatedGpu
        );
    }

    #[test]
    fn out_of_range_values_fall_back_to_defaults() {
        let mut store = MemorySettingsStore::default();
        store.set(SettingProperty::PlayerPosition, 9).unwrap();
        store.set(SettingProperty::PlayerHW, -1).unwrap();

        let snapshot = SettingsSnapshot::read_from(&store);

        assert_eq!(snapshot.player_position, PlayerPosition::RightTop);
        assert_eq!(snapshot.player_hardware_decode, PlayerHardwareDecode::Hardware);
    }

    #[test]
    fn setter_is_readable_and_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut mirror = SettingsMirror::new(Box::new(TomlSettingsStore::open(&path).unwrap()));
        mirror.load();
        mirror.set_player_size(PlayerSize::Large).unwrap();
        mirror.set_player_position(PlayerPosition::LeftBottom).unwrap();
        mirror.set_check_update_on_startup(false).unwrap();
        assert_eq!(mirror.player_size(), PlayerSize::Large);
        drop(mirror);

        let mut reloaded =
            SettingsMirror::new(Box::new(TomlSettingsStore::open(&path).unwrap()));
        reloaded.load();
        assert_eq!(reloaded.player_size(), PlayerSize::Large);
        assert_eq!(reloaded.player_position(), PlayerPosition::LeftBottom);
        assert!(!reloaded.check_update_on_startup());
    }

    #[test]
    fn failed_login_registration_is_not_persisted() {
        let mut store = MemorySettingsStore::default();
        store.fail_autostart(true);
        let mut mirror = SettingsMirror::new(Box::new(store));
        mirror.load();

        let result = mirror.set_start_at_login(true);

        assert!(matches!(result, Err(SettingsError::Unsupported(_))));
        assert!(!mirror.start_at_login());
        assert_eq!(mirror.store().get(SettingProperty::StartAtLogin, 0), 0);
    }

    #[test]
    fn login_registration_persists_on_success() {
        let mut mirror = SettingsMirror::new(Box::new(MemorySettingsStore::default()));
        mirror.load();

        mirror.set_start_at_login(true).unwrap();

        assert!(mirror.start_at_login());
        assert_eq!(mirror.store().get(SettingProperty::StartAtLogin, 0), 1);
    }
}
