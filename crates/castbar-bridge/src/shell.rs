/// Failure of a native shell facility (browser launcher, dialog subsystem...).
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The system browser could not be opened.
    #[error("failed to open {url}: {reason}")]
    Browser {
        /// URL that was requested.
        url: String,
        /// Reason reported by the platform.
        reason: String,
    },
    /// Any other native call failed.
    #[error("shell call failed: {0}")]
    Native(String),
}

/// The user-facing shell the lifecycle controller drives.
///
/// One implementation exists per platform. The `on_*` hooks are invoked by the
/// event bridge on the thread that published the event, which is usually the
/// backend worker: implementations that own single-threaded UI state must
/// marshal back onto their UI thread themselves.
///
/// The hooks default to logging; shells override the ones they surface.
pub trait Shell: Send + Sync {
    /// Shows a blocking-style message to the user.
    fn alert(&self, content: &str);

    /// Shows a transient notification.
    fn notification(&self, title: &str, content: &str);

    /// Opens `url` in the user's browser.
    fn open_browser(&self, url: &str) -> Result<(), ShellError>;

    /// A newer release tagged `version` is available.
    fn new_update(&self, version: &str);

    /// The renderer reported a failure.
    fn on_backend_error(&self, reason: &str) {
        log::debug!("backend_error: {reason}");
    }

    /// The renderer started.
    fn on_backend_start(&self) {
        log::debug!("backend_start");
    }

    /// Playback stopped.
    fn on_backend_playback_stop(&self) {
        log::debug!("backend_playback_stop");
    }

    /// Playback of `uri` started.
    fn on_backend_playback_uri(&self, uri: &str) {
        log::debug!("backend_playback_uri: {uri}");
    }

    /// The advertised address changed to `address`.
    fn on_network_ip_changed(&self, address: &str) {
        log::debug!("network_ip_changed: {address}");
    }

    /// The backend asked for a notification.
    fn on_notify(&self, title: &str, content: &str) {
        self.notification(title, content);
    }
}
