//! Supervision of an external renderer process.
//!
//! [`ProcessRenderer`] is the backend service used by the binary: it launches
//! the configured renderer executable on the worker thread, restarts it when
//! player preferences change, watches the local address, and kills the
//! process when asked to stop.
//!
//! The renderer learns the player preferences from its environment, see
//! [`PlayerPreferences`].

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use castbar_bridge::config::{BackendConfig, PlayerPreferences};
use castbar_bridge::{CastBridge, CastEvent, Topic};

use crate::network::local_ip_address;

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(200);

/// A casting backend driven by the lifecycle controller.
///
/// `run` executes on the backend worker thread and blocks until `stop` is
/// called from another thread; it must return promptly afterwards. Startup
/// and runtime failures are published as [`CastEvent::BackendError`] rather
/// than returned.
pub trait BackendService: Send + Sync {
    /// Runs the service, publishing its events on `bridge`.
    fn run(&self, bridge: &CastBridge);

    /// Requests `run` to return.
    fn stop(&self);
}

#[derive(Debug, Default)]
struct Requests {
    stop: bool,
    reload: bool,
}

enum Request {
    Stop,
    Reload,
    Idle,
}

#[derive(Debug, Default)]
struct Control {
    requests: Mutex<Requests>,
    preferences: Mutex<PlayerPreferences>,
    wake: Condvar,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_stop(&self) {
        self.lock().stop = true;
        self.wake.notify_all();
    }

    fn request_reload(&self, preferences: PlayerPreferences) {
        self.set_preferences(preferences);
        self.lock().reload = true;
        self.wake.notify_all();
    }

    fn set_preferences(&self, preferences: PlayerPreferences) {
        *self
            .preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = preferences;
    }

    fn preferences(&self) -> PlayerPreferences {
        *self
            .preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        *self.lock() = Requests::default();
    }

    /// Waits up to `timeout` for a request. A stop wins over a reload.
    fn wait(&self, timeout: Duration) -> Request {
        let (mut requests, _) = self
            .wake
            .wait_timeout_while(self.lock(), timeout, |requests| {
                !requests.stop && !requests.reload
            })
            .unwrap_or_else(PoisonError::into_inner);

        if requests.stop {
            Request::Stop
        } else if requests.reload {
            requests.reload = false;
            Request::Reload
        } else {
            Request::Idle
        }
    }
}

/// Backend service supervising a renderer executable.
#[derive(Debug)]
pub struct ProcessRenderer {
    program: Option<PathBuf>,
    args: Vec<String>,
    ip_poll_interval: Duration,
    control: Arc<Control>,
}

impl ProcessRenderer {
    pub fn new(program: Option<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            ip_poll_interval: Duration::from_millis(BackendConfig::default().ip_poll_interval_ms),
            control: Arc::default(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.renderer_path.clone(), config.renderer_args.clone())
            .with_ip_poll_interval(Duration::from_millis(config.ip_poll_interval_ms))
    }

    #[must_use]
    pub const fn with_ip_poll_interval(mut self, interval: Duration) -> Self {
        self.ip_poll_interval = interval;
        self
    }

    /// Preferences for the first launch; later ones arrive with
    /// [`CastEvent::ReloadRenderer`].
    #[must_use]
    pub fn with_player_preferences(self, preferences: PlayerPreferences) -> Self {
        self.control.set_preferences(preferences);
        self
    }

    fn spawn_renderer(&self, bridge: &CastBridge) -> Option<Child> {
        let Some(program) = self.program.as_ref() else {
            bridge.publish(&CastEvent::BackendError {
                reason: "no renderer executable is configured".to_string(),
            });
            return None;
        };

        let preferences = self.control.preferences();
        match Command::new(program)
            .args(&self.args)
            .envs(preferences.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                log::info!(
                    "Started renderer {program:?} (pid {}) with {preferences:?}",
                    child.id()
                );
                bridge.publish(&CastEvent::BackendStart);
                Some(child)
            }
            Err(err) => {
                log::error!("Failed to start renderer {program:?}: {err}");
                bridge.publish(&CastEvent::BackendError {
                    reason: format!("cannot start player: {err}"),
                });
                None
            }
        }
    }

    fn supervise(&self, bridge: &CastBridge) {
        let mut child = self.spawn_renderer(bridge);
        let mut address: IpAddr = local_ip_address();
        let mut last_address_check = Instant::now();

        loop {
            match self.control.wait(SUPERVISE_INTERVAL) {
                Request::Stop => break,
                Request::Reload => {
                    log::info!("Reloading renderer");
                    terminate(&mut child);
                    child = self.spawn_renderer(bridge);
                }
                Request::Idle => {}
            }

            if let Some(process) = child.as_mut() {
                match process.try_wait() {
                    Ok(Some(status)) => {
                        child = None;
                        log::warn!("Renderer exited with {status}");
                        bridge.publish(&CastEvent::BackendError {
                            reason: format!("player exited with {status}"),
                        });
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("Failed to poll renderer: {err}"),
                }
            }

            if last_address_check.elapsed() >= self.ip_poll_interval {
                last_address_check = Instant::now();
                let current = local_ip_address();
                if current != address {
                    log::info!("Local address changed from {address} to {current}");
                    address = current;
                    bridge.publish(&CastEvent::NetworkIpChanged {
                        address: current.to_string(),
                    });
                }
            }
        }

        terminate(&mut child);
    }
}

fn terminate(child: &mut Option<Child>) {
    let Some(mut process) = child.take() else {
        return;
    };
    if let Err(err) = process.kill() {
        log::debug!("Renderer already gone: {err}");
    }
    match process.wait() {
        Ok(status) => log::debug!("Renderer reaped with {status}"),
        Err(err) => log::warn!("Failed to reap renderer: {err}"),
    }
}

impl BackendService for ProcessRenderer {
    fn run(&self, bridge: &CastBridge) {
        let control = Arc::clone(&self.control);
        let reload = bridge.subscribe(Topic::ReloadRenderer.name(), move |event: &CastEvent| {
            if let CastEvent::ReloadRenderer { preferences } = event {
                control.request_reload(*preferences);
            }
        });

        self.supervise(bridge);

        bridge.unsubscribe(Topic::ReloadRenderer.name(), reload);
        // a stop requested before `run` started is consumed here, not lost
        self.control.reset();
        log::debug!("Renderer supervision finished");
    }

    fn stop(&self) {
        self.control.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn record(bridge: &CastBridge, topic: Topic) -> Receiver<CastEvent> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        bridge.subscribe(topic.name(), move |event: &CastEvent| {
            let _ = tx.lock().unwrap().send(event.clone());
        });
        rx
    }

    fn run_in_background(
        renderer: &Arc<ProcessRenderer>,
        bridge: &CastBridge,
    ) -> thread::JoinHandle<()> {
        let renderer = Arc::clone(renderer);
        let bridge = bridge.clone();
        thread::spawn(move || renderer.run(&bridge))
    }

    #[test]
    fn missing_program_reports_error_and_waits_for_stop() {
        let bridge = CastBridge::new();
        let errors = record(&bridge, Topic::BackendError);
        let renderer = Arc::new(ProcessRenderer::new(None, Vec::new()));

        let worker = run_in_background(&renderer, &bridge);
        let event = errors.recv_timeout(WAIT).unwrap();
        assert!(matches!(event, CastEvent::BackendError { .. }));
        assert!(!worker.is_finished());

        renderer.stop();
        worker.join().unwrap();
        assert_eq!(bridge.subscriber_count(Topic::ReloadRenderer.name()), 0);
    }

    #[test]
    fn stop_before_run_is_not_lost() {
        let bridge = CastBridge::new();
        let renderer = Arc::new(ProcessRenderer::new(None, Vec::new()));

        renderer.stop();
        let worker = run_in_background(&renderer, &bridge);
        worker.join().unwrap();
    }

    #[test]
    fn unknown_executable_is_reported() {
        let bridge = CastBridge::new();
        let errors = record(&bridge, Topic::BackendError);
        let renderer = Arc::new(ProcessRenderer::new(
            Some(PathBuf::from("/nonexistent/castbar-renderer")),
            Vec::new(),
        ));

        let worker = run_in_background(&renderer, &bridge);
        let event = errors.recv_timeout(WAIT).unwrap();
        assert!(
            matches!(event, CastEvent::BackendError { ref reason } if reason.starts_with("cannot start player"))
        );

        renderer.stop();
        worker.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn renderer_is_started_reloaded_and_killed() {
        let bridge = CastBridge::new();
        let starts = record(&bridge, Topic::BackendStart);
        let renderer = Arc::new(ProcessRenderer::new(
            Some(PathBuf::from("sleep")),
            vec!["60".to_string()],
        ));

        let worker = run_in_background(&renderer, &bridge);
        starts.recv_timeout(WAIT).unwrap();

        // the reload subscription is registered before the first start event
        assert_eq!(
            bridge.publish(&CastEvent::ReloadRenderer {
                preferences: PlayerPreferences::default(),
            }),
            1
        );
        starts.recv_timeout(WAIT).unwrap();

        let stopping = Instant::now();
        renderer.stop();
        worker.join().unwrap();
        assert!(stopping.elapsed() < WAIT);
    }

    #[cfg(unix)]
    #[test]
    fn unexpected_exit_is_reported() {
        let bridge = CastBridge::new();
        let errors = record(&bridge, Topic::BackendError);
        let renderer = Arc::new(ProcessRenderer::new(Some(PathBuf::from("true")), Vec::new()));

        let worker = run_in_background(&renderer, &bridge);
        let event = errors.recv_timeout(WAIT).unwrap();
        assert!(
            matches!(event, CastEvent::BackendError { ref reason } if reason.starts_with("player exited"))
        );

        renderer.stop();
        worker.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn preferences_reach_the_renderer_environment() {
        use castbar_bridge::config::{PlayerHardwareDecode, PlayerPosition, PlayerSize};

        fn wait_for_contents(path: &std::path::Path, expected: &str) -> bool {
            let deadline = Instant::now() + WAIT;
            while Instant::now() < deadline {
                if std::fs::read_to_string(path).is_ok_and(|text| text.trim() == expected) {
                    return true;
                }
                thread::sleep(Duration::from_millis(20));
            }
            false
        }

        let dir = tempfile::TempDir::new().unwrap();
        let report = dir.path().join("env.txt");
        let script = "echo \"$CASTBAR_PLAYER_SIZE $CASTBAR_PLAYER_POSITION $CASTBAR_PLAYER_HW\" > \"$0\"; exec sleep 60";
        let bridge = CastBridge::new();
        let renderer = Arc::new(
            ProcessRenderer::new(
                Some(PathBuf::from("sh")),
                vec![
                    "-c".to_string(),
                    script.to_string(),
                    report.display().to_string(),
                ],
            )
            .with_player_preferences(PlayerPreferences {
                size: PlayerSize::Large,
                ..PlayerPreferences::default()
            }),
        );

        let worker = run_in_background(&renderer, &bridge);
        assert!(wait_for_contents(&report, "2 2 1"));

        bridge.publish(&CastEvent::ReloadRenderer {
            preferences: PlayerPreferences {
                size: PlayerSize::Auto,
                position: PlayerPosition::Center,
                hardware_decode: PlayerHardwareDecode::Software,
            },
        });
        assert!(wait_for_contents(&report, "3 4 0"));

        renderer.stop();
        worker.join().unwrap();
    }
}
