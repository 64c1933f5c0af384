//! Communication bridge between the casting backend and the user-facing shell.
//!
//! This crate defines the types shared by the lifecycle controller and the
//! shell that drives it:
//! - [`EventBridge`], a named-topic publish/subscribe registry the backend
//!   worker publishes on.
//! - [`CastEvent`] and [`Topic`], the events the backend emits and the topic
//!   names they travel on.
//! - [`shell::Shell`], the callbacks the controller invokes on the shell.
//! - [`config`], the persisted configuration and player preference types.
//!
//! Handlers subscribed on the bridge run on the publishing thread, which is
//! usually the backend worker and not the shell's UI thread.

pub mod config;
pub mod registry;
pub mod shell;

use std::fmt;

use crate::config::PlayerPreferences;

pub use crate::registry::{EventBridge, SubscriptionId, TopicEvent};

/// Named channels used by the casting core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// The renderer failed to start or crashed.
    BackendError,
    /// The renderer is up and accepting casting connections.
    BackendStart,
    /// Playback of the current media ended.
    BackendPlaybackStop,
    /// A new media URI started playing.
    BackendPlaybackUri,
    /// The address the backend advertises itself on changed.
    NetworkIpChanged,
    /// The backend asks the shell to show a notification.
    Notify,
    /// Player preferences changed and the renderer should reload them.
    ReloadRenderer,
}

impl Topic {
    /// Topics the lifecycle controller subscribes to while the service runs.
    pub const CONTROLLER_TOPICS: [Self; 6] = [
        Self::BackendError,
        Self::BackendStart,
        Self::BackendPlaybackStop,
        Self::BackendPlaybackUri,
        Self::NetworkIpChanged,
        Self::Notify,
    ];

    /// Wire name of the topic.
    pub const fn name(self) -> &'static str {
        match self {
            Self::BackendError => "backend_error",
            Self::BackendStart => "backend_start",
            Self::BackendPlaybackStop => "backend_playback_stop",
            Self::BackendPlaybackUri => "backend_playback_uri",
            Self::NetworkIpChanged => "network_ip_changed",
            Self::Notify => "notify",
            Self::ReloadRenderer => "reload_renderer",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events published on the bridge by the backend (and, for
/// [`CastEvent::ReloadRenderer`], by the controller towards the backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastEvent {
    /// Renderer failure with a human-readable reason.
    BackendError {
        /// What went wrong.
        reason: String,
    },
    /// Renderer started.
    BackendStart,
    /// Playback stopped.
    BackendPlaybackStop,
    /// Playback started for the given URI.
    BackendPlaybackUri {
        /// Media URI being played.
        uri: String,
    },
    /// The advertised address changed.
    NetworkIpChanged {
        /// New address, formatted for display.
        address: String,
    },
    /// A notification the shell should surface.
    Notify {
        /// Notification title.
        title: String,
        /// Notification body.
        content: String,
    },
    /// Player preferences were changed; the renderer restarts with these.
    ReloadRenderer {
        /// Preferences after the change.
        preferences: PlayerPreferences,
    },
}

impl CastEvent {
    /// The topic this event travels on.
    pub const fn kind(&self) -> Topic {
        match self {
            Self::BackendError { .. } => Topic::BackendError,
            Self::BackendStart => Topic::BackendStart,
            Self::BackendPlaybackStop => Topic::BackendPlaybackStop,
            Self::BackendPlaybackUri { .. } => Topic::BackendPlaybackUri,
            Self::NetworkIpChanged { .. } => Topic::NetworkIpChanged,
            Self::Notify { .. } => Topic::Notify,
            Self::ReloadRenderer { .. } => Topic::ReloadRenderer,
        }
    }
}

impl TopicEvent for CastEvent {
    fn topic(&self) -> &str {
        self.kind().name()
    }
}

/// The bridge instance shared by the controller, the backend and the shell.
pub type CastBridge = EventBridge<CastEvent>;
