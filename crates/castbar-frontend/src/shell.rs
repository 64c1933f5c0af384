use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use castbar_bridge::shell::{Shell, ShellError};

use crate::formatting::ip_label;

/// A [`Shell`] that prints to a terminal.
///
/// Hooks run on the backend worker thread, so all mutable state sits behind
/// mutexes and output lines are written whole.
pub struct TerminalShell {
    release_page: String,
    output: Mutex<Box<dyn Write + Send>>,
    video_uri: Mutex<Option<String>>,
    address: Mutex<Option<String>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TerminalShell {
    /// Shell writing to stdout; `release_page` is opened when an update is
    /// announced.
    pub fn new(release_page: impl Into<String>) -> Self {
        Self::with_output(release_page, io::stdout())
    }

    pub fn with_output(release_page: impl Into<String>, output: impl Write + Send + 'static) -> Self {
        Self {
            release_page: release_page.into(),
            output: Mutex::new(Box::new(output)),
            video_uri: Mutex::new(None),
            address: Mutex::new(None),
        }
    }

    /// URI of the video currently playing, available for copying.
    pub fn video_uri(&self) -> Option<String> {
        lock(&self.video_uri).clone()
    }

    /// Last address reported by the backend.
    pub fn address(&self) -> Option<String> {
        lock(&self.address).clone()
    }

    /// Writes one line to the terminal.
    pub fn line(&self, text: impl Display) {
        let mut output = lock(&self.output);
        if let Err(err) = writeln!(output, "{text}").and_then(|()| output.flush()) {
            log::warn!("Failed to write to the terminal: {err}");
        }
    }
}

impl Shell for TerminalShell {
    fn alert(&self, content: &str) {
        self.line(format_args!("! {content}"));
    }

    fn notification(&self, title: &str, content: &str) {
        self.line(format_args!("[{title}] {content}"));
    }

    fn open_browser(&self, url: &str) -> Result<(), ShellError> {
        log::debug!("Opening {url}");
        webbrowser::open(url).map_err(|err| ShellError::Browser {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    fn new_update(&self, version: &str) {
        self.notification("New Update", &format!("castbar {version} is available"));
        if let Err(err) = self.open_browser(&self.release_page) {
            log::warn!("{err}");
            self.line(format_args!("Download it from {}", self.release_page));
        }
    }

    fn on_backend_error(&self, reason: &str) {
        self.notification("castbar", reason);
    }

    fn on_backend_start(&self) {
        self.notification("castbar", "renderer is ready");
    }

    fn on_backend_playback_stop(&self) {
        *lock(&self.video_uri) = None;
        self.line("Playback stopped");
    }

    fn on_backend_playback_uri(&self, uri: &str) {
        *lock(&self.video_uri) = Some(uri.to_string());
        self.line(format_args!("Playing {uri} (type `copy` to print the video URI)"));
    }

    fn on_network_ip_changed(&self, address: &str) {
        *lock(&self.address) = Some(address.to_string());
        self.line(ip_label(address));
    }
}
