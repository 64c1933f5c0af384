#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use castbar_backend::store::MemorySettingsStore;
use castbar_backend::{BackendService, ControllerOptions, LifecycleController, UpdateChecker};
use castbar_bridge::config::SettingProperty;
use castbar_bridge::shell::{Shell, ShellError};
use castbar_bridge::{CastBridge, CastEvent};

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    Alert(String),
    Notification(String, String),
    OpenBrowser(String),
    NewUpdate(String),
    BackendError(String),
    BackendStart,
    PlaybackStop,
    PlaybackUri(String),
    IpChanged(String),
}

#[derive(Default)]
pub struct RecordingShell {
    calls: Mutex<Vec<ShellCall>>,
    fail_browser: AtomicBool,
}

impl RecordingShell {
    pub fn calls(&self) -> Vec<ShellCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ShellCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    pub fn fail_browser(&self) {
        self.fail_browser.store(true, Ordering::SeqCst);
    }

    fn push(&self, call: ShellCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Shell for RecordingShell {
    fn alert(&self, content: &str) {
        self.push(ShellCall::Alert(content.to_string()));
    }

    fn notification(&self, title: &str, content: &str) {
        self.push(ShellCall::Notification(title.to_string(), content.to_string()));
    }

    fn open_browser(&self, url: &str) -> Result<(), ShellError> {
        if self.fail_browser.load(Ordering::SeqCst) {
            return Err(ShellError::Native("no browser".to_string()));
        }
        self.push(ShellCall::OpenBrowser(url.to_string()));
        Ok(())
    }

    fn new_update(&self, version: &str) {
        self.push(ShellCall::NewUpdate(version.to_string()));
    }

    fn on_backend_error(&self, reason: &str) {
        self.push(ShellCall::BackendError(reason.to_string()));
    }

    fn on_backend_start(&self) {
        self.push(ShellCall::BackendStart);
    }

    fn on_backend_playback_stop(&self) {
        self.push(ShellCall::PlaybackStop);
    }

    fn on_backend_playback_uri(&self, uri: &str) {
        self.push(ShellCall::PlaybackUri(uri.to_string()));
    }

    fn on_network_ip_changed(&self, address: &str) {
        self.push(ShellCall::IpChanged(address.to_string()));
    }
}

/// Backend that announces itself and then blocks until stopped. With
/// `ignore_stop` it keeps blocking until [`ScriptedBackend::release`].
#[derive(Default)]
pub struct ScriptedBackend {
    stop_requested: Mutex<bool>,
    wake: Condvar,
    ignore_stop: AtomicBool,
    released: AtomicBool,
    pub runs: AtomicUsize,
    pub finished: AtomicUsize,
}

impl ScriptedBackend {
    pub fn hanging() -> Self {
        let backend = Self::default();
        backend.ignore_stop.store(true, Ordering::SeqCst);
        backend
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl BackendService for ScriptedBackend {
    fn run(&self, bridge: &CastBridge) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        bridge.publish(&CastEvent::BackendStart);

        let mut stop = self.stop_requested.lock().unwrap();
        loop {
            let ignoring = self.ignore_stop.load(Ordering::SeqCst)
                && !self.released.load(Ordering::SeqCst);
            if *stop && !ignoring {
                break;
            }
            stop = self
                .wake
                .wait_timeout(stop, Duration::from_millis(20))
                .unwrap()
                .0;
        }
        *stop = false;
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        *self.stop_requested.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

pub fn no_proxy_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Store with the startup release check disabled, so no test reaches the
/// network by accident.
pub fn quiet_store() -> MemorySettingsStore {
    let mut store = MemorySettingsStore::default().with_version("2.2");
    castbar_backend::settings::SettingsStore::set(&mut store, SettingProperty::CheckUpdate, 0)
        .unwrap();
    store
}

pub fn controller_with(
    shell: &Arc<RecordingShell>,
    backend: &Arc<ScriptedBackend>,
    store: MemorySettingsStore,
    options: ControllerOptions,
    endpoint: &str,
) -> LifecycleController {
    LifecycleController::new(shell.clone(), backend.clone(), Box::new(store), options)
        .unwrap()
        .with_update_checker(UpdateChecker::with_client(no_proxy_client(), endpoint, "2.2"))
}

pub fn controller(shell: &Arc<RecordingShell>, backend: &Arc<ScriptedBackend>) -> LifecycleController {
    controller_with(
        shell,
        backend,
        quiet_store(),
        ControllerOptions::default(),
        "http://127.0.0.1:9/releases/latest",
    )
}

pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Serves one canned HTTP response on loopback and returns its URL.
pub fn serve_once(status_line: &'static str, body: impl Into<String>) -> String {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut buffer = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            match stream.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(read) => request.extend_from_slice(&buffer[..read]),
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
    });

    format!("http://{address}/releases/latest")
}
