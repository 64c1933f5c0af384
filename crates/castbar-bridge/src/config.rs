use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Keys of the typed preferences kept in the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingProperty {
    /// Register the application to start with the user session (0/1).
    StartAtLogin,
    /// Check for a newer release on startup (0/1).
    CheckUpdate,
    /// Index into [`PlayerSize`].
    PlayerSize,
    /// Index into [`PlayerPosition`].
    PlayerPosition,
    /// Index into [`PlayerHardwareDecode`].
    PlayerHW,
}

impl SettingProperty {
    /// Value used when the store holds nothing for the property.
    pub const fn default_value(self) -> i64 {
        match self {
            Self::StartAtLogin => 0,
            Self::CheckUpdate => 1,
            Self::PlayerSize => PlayerSize::Normal.index(),
            Self::PlayerPosition => PlayerPosition::RightTop.index(),
            Self::PlayerHW => PlayerHardwareDecode::Hardware.index(),
        }
    }
}

/// Size of the renderer's player window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i64)]
pub enum PlayerSize {
    Small = 0,
    #[default]
    Normal = 1,
    Large = 2,
    /// Sized by the media; forces [`PlayerPosition::Center`].
    Auto = 3,
    Fullscreen = 4,
}

impl PlayerSize {
    pub const ALL: [Self; 5] = [
        Self::Small,
        Self::Normal,
        Self::Large,
        Self::Auto,
        Self::Fullscreen,
    ];

    pub const fn index(self) -> i64 {
        self as i64
    }

    pub fn from_index(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Normal => "Normal",
            Self::Large => "Large",
            Self::Auto => "Auto",
            Self::Fullscreen => "Fullscreen",
        }
    }
}

/// Screen corner (or centre) the player window is placed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i64)]
pub enum PlayerPosition {
    LeftTop = 0,
    LeftBottom = 1,
    #[default]
    RightTop = 2,
    RightBottom = 3,
    Center = 4,
}

impl PlayerPosition {
    pub const ALL: [Self; 5] = [
        Self::LeftTop,
        Self::LeftBottom,
        Self::RightTop,
        Self::RightBottom,
        Self::Center,
    ];

    pub const fn index(self) -> i64 {
        self as i64
    }

    pub fn from_index(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::LeftTop => "LeftTop",
            Self::LeftBottom => "LeftBottom",
            Self::RightTop => "RightTop",
            Self::RightBottom => "RightBottom",
            Self::Center => "Center",
        }
    }
}

/// Video decoding mode of the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i64)]
pub enum PlayerHardwareDecode {
    /// Software decoding only.
    Software = 0,
    /// Platform default hardware decoding.
    #[default]
    Hardware = 1,
    /// Hardware decoding pinned to the dedicated GPU.
    ForceDedicatedGpu = 2,
}

impl PlayerHardwareDecode {
    pub const ALL: [Self; 3] = [Self::Software, Self::Hardware, Self::ForceDedicatedGpu];

    pub const fn index(self) -> i64 {
        self as i64
    }

    pub fn from_index(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Software => "Software Decode",
            Self::Hardware => "Hardware Decode",
            Self::ForceDedicatedGpu => "Force Dedicated GPU",
        }
    }
}

/// Raw preference values as persisted. Absent values fall back to
/// [`SettingProperty::default_value`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at_login: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_update: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_hw: Option<i64>,
}

impl Preferences {
    /// Stored value of `property`, if any.
    pub const fn get(&self, property: SettingProperty) -> Option<i64> {
        match property {
            SettingProperty::StartAtLogin => self.start_at_login,
            SettingProperty::CheckUpdate => self.check_update,
            SettingProperty::PlayerSize => self.player_size,
            SettingProperty::PlayerPosition => self.player_position,
            SettingProperty::PlayerHW => self.player_hw,
        }
    }

    /// Overwrites the stored value of `property`.
    pub const fn set(&mut self, property: SettingProperty, value: i64) {
        let slot = match property {
            SettingProperty::StartAtLogin => &mut self.start_at_login,
            SettingProperty::CheckUpdate => &mut self.check_update,
            SettingProperty::PlayerSize => &mut self.player_size,
            SettingProperty::PlayerPosition => &mut self.player_position,
            SettingProperty::PlayerHW => &mut self.player_hw,
        };
        *slot = Some(value);
    }
}

/// Player preferences the renderer is launched with.
///
/// They reach the renderer process as the `CASTBAR_PLAYER_SIZE`,
/// `CASTBAR_PLAYER_POSITION` and `CASTBAR_PLAYER_HW` environment variables,
/// each holding the variant index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerPreferences {
    pub size: PlayerSize,
    pub position: PlayerPosition,
    pub hardware_decode: PlayerHardwareDecode,
}

impl PlayerPreferences {
    /// Reads the player values out of `preferences`, using the defaults for
    /// absent or out-of-range entries.
    pub fn from_preferences(preferences: &Preferences) -> Self {
        Self {
            size: preferences
                .player_size
                .and_then(PlayerSize::from_index)
                .unwrap_or_default(),
            position: preferences
                .player_position
                .and_then(PlayerPosition::from_index)
                .unwrap_or_default(),
            hardware_decode: preferences
                .player_hw
                .and_then(PlayerHardwareDecode::from_index)
                .unwrap_or_default(),
        }
    }

    /// Environment of the renderer process.
    pub fn env_vars(&self) -> [(&'static str, String); 3] {
        [
            ("CASTBAR_PLAYER_SIZE", self.size.index().to_string()),
            ("CASTBAR_PLAYER_POSITION", self.position.index().to_string()),
            ("CASTBAR_PLAYER_HW", self.hardware_decode.index().to_string()),
        ]
    }
}

/// Where and how the remote release descriptor is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// URL of a JSON document carrying a `tag_name` string.
    pub endpoint: String,
    /// Page opened in the browser when a new release is available.
    pub release_page: String,
    /// Page opened by the "About" action.
    pub project_page: String,
    /// Upper bound for the whole request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.github.com/repos/xfangfang/Macast/releases/latest".to_string(),
            release_page: "https://github.com/xfangfang/Macast/releases/latest".to_string(),
            project_page: "https://github.com/xfangfang/Macast".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Settings of the renderer process supervised by the backend worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Renderer executable. Without one the worker reports `backend_error`.
    pub renderer_path: Option<PathBuf>,
    /// Extra arguments passed to the renderer.
    pub renderer_args: Vec<String>,
    /// Upper bound for the stop join, in milliseconds. Unset waits forever.
    pub stop_timeout_ms: Option<u64>,
    /// How often the advertised address is re-checked, in milliseconds.
    pub ip_poll_interval_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            renderer_path: None,
            renderer_args: Vec::new(),
            stop_timeout_ms: None,
            ip_poll_interval_ms: 5_000,
        }
    }
}

/// Global application configuration, persisted as `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Typed user preferences.
    pub preferences: Preferences,
    /// Release check settings.
    pub update: UpdateConfig,
    /// Renderer supervision settings.
    pub backend: BackendConfig,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn player_preferences_fall_back_per_field() {
        let preferences = Preferences {
            player_size: Some(3),
            player_position: Some(42),
            ..Preferences::default()
        };

        let player = PlayerPreferences::from_preferences(&preferences);

        assert_eq!(player.size, PlayerSize::Auto);
        assert_eq!(player.position, PlayerPosition::RightTop);
        assert_eq!(player.hardware_decode, PlayerHardwareDecode::Hardware);
        assert_eq!(
            player.env_vars(),
            [
                ("CASTBAR_PLAYER_SIZE", "3".to_string()),
                ("CASTBAR_PLAYER_POSITION", "2".to_string()),
                ("CASTBAR_PLAYER_HW", "1".to_string()),
            ]
        );
    }

    #[rstest]
    #[case(-1, None)]
    #[case(0, Some(PlayerSize::Small))]
    #[case(3, Some(PlayerSize::Auto))]
    #[case(4, Some(PlayerSize::Fullscreen))]
    #[case(5, None)]
    fn player_size_from_index(#[case] value: i64, #[case] expected: Option<PlayerSize>) {
        assert_eq!(PlayerSize::from_index(value), expected);
    }

    #[test]
    fn indices_round_trip_for_every_variant() {
        for size in PlayerSize::ALL {
            assert_eq!(PlayerSize::from_index(size.index()), Some(size));
        }
        for position in PlayerPosition::ALL {
            assert_eq!(PlayerPosition::from_index(position.index()), Some(position));
        }
        for decode in PlayerHardwareDecode::ALL {
            assert_eq!(PlayerHardwareDecode::from_index(decode.index()), Some(decode));
        }
        assert_eq!(PlayerHardwareDecode::from_index(3), None);
    }

    #[test]
    fn defaults_match_the_documented_values() {
        assert_eq!(SettingProperty::StartAtLogin.default_value(), 0);
        assert_eq!(SettingProperty::CheckUpdate.default_value(), 1);
        assert_eq!(SettingProperty::PlayerSize.default_value(), 1);
        assert_eq!(SettingProperty::PlayerPosition.default_value(), 2);
        assert_eq!(SettingProperty::PlayerHW.default_value(), 1);
    }

    #[test]
    fn preferences_get_reflects_set() {
        let mut preferences = Preferences::default();
        assert_eq!(preferences.get(SettingProperty::PlayerSize), None);
        preferences.set(SettingProperty::PlayerSize, 4);
        assert_eq!(preferences.get(SettingProperty::PlayerSize), Some(4));
        assert_eq!(preferences.get(SettingProperty::PlayerPosition), None);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [preferences]
            player_size = 3

            [backend]
            stop_timeout_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.preferences.player_size, Some(3));
        assert_eq!(config.preferences.check_update, None);
        assert_eq!(config.backend.stop_timeout_ms, Some(2500));
        assert_eq!(config.backend.ip_poll_interval_ms, 5_000);
        assert_eq!(config.update, UpdateConfig::default());
    }
}
