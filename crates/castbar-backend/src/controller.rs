//! The lifecycle controller: start/stop/toggle state machine for the backend
//! service and the glue between backend events and the shell.
//!
//! Two threads matter here. The shell's main loop owns the controller and
//! calls its methods; the backend worker thread, spawned by
//! [`LifecycleController::start_cast`], runs [`BackendService::run`] and
//! publishes events whose handlers therefore execute on the worker thread.
//! [`LifecycleController::stop_cast`] is the one place the shell thread
//! blocks on the worker: topics are only unsubscribed once the worker has
//! fully returned, so no handler can fire against a half-stopped controller.

use std::net::IpAddr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use castbar_bridge::config::{
    Config, PlayerHardwareDecode, PlayerPosition, PlayerSize, UpdateConfig,
};
use castbar_bridge::shell::Shell;
use castbar_bridge::{CastBridge, CastEvent, SubscriptionId, Topic};
use tokio::runtime::Runtime;

use crate::runtime::build_runtime;
use crate::services::renderer_service::BackendService;
use crate::services::update_service::{UpdateCheckError, UpdateChecker, UpdateOutcome};
use crate::settings::{SettingsError, SettingsMirror, SettingsStore};
use crate::state::ServiceState;

/// Confirmation shown after a verbose check finds nothing newer.
pub const UP_TO_DATE_MESSAGE: &str = "You're up to date.";

/// Errors reported by the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// `stop_cast` was called while the service was stopped.
    #[error("the backend service is not running")]
    NotRunning,
    /// The worker did not return within the configured stop timeout. The
    /// service is still considered running.
    #[error("backend worker did not stop within {0:?}")]
    StopTimedOut(Duration),
    /// The async runtime could not be created.
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The release checker could not be created.
    #[error(transparent)]
    UpdateChecker(#[from] UpdateCheckError),
}

/// Tunables of the controller.
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    /// Release check endpoint and pages.
    pub update: UpdateConfig,
    /// Upper bound for the worker join in `stop_cast`; `None` waits forever.
    pub stop_timeout: Option<Duration>,
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            update: config.update.clone(),
            stop_timeout: config.backend.stop_timeout_ms.map(Duration::from_millis),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stopped: Receiver<()>,
    // set once `BackendService::stop` was called for this worker
    stop_requested: bool,
}

type NowPlaying = Arc<Mutex<Option<String>>>;

fn lock(now_playing: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    now_playing.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes one backend event to the matching shell hook.
fn dispatch(shell: &dyn Shell, now_playing: &Mutex<Option<String>>, event: &CastEvent) {
    match event {
        CastEvent::BackendError { reason } => shell.on_backend_error(reason),
        CastEvent::BackendStart => shell.on_backend_start(),
        CastEvent::BackendPlaybackStop => {
            *lock(now_playing) = None;
            shell.on_backend_playback_stop();
        }
        CastEvent::BackendPlaybackUri { uri } => {
            *lock(now_playing) = Some(uri.clone());
            shell.on_backend_playback_uri(uri);
        }
        CastEvent::NetworkIpChanged { address } => shell.on_network_ip_changed(address),
        CastEvent::Notify { title, content } => shell.on_notify(title, content),
        CastEvent::ReloadRenderer { .. } => {}
    }
}

/// Surfaces an update outcome on the shell. Nothing is shown for an
/// up-to-date or failed check unless `verbose`.
pub fn report_update_outcome(shell: &dyn Shell, outcome: &UpdateOutcome, verbose: bool) {
    match outcome {
        UpdateOutcome::NewVersionAvailable(version) => shell.new_update(version),
        UpdateOutcome::UpToDate if verbose => shell.alert(UP_TO_DATE_MESSAGE),
        UpdateOutcome::CheckFailed(err) if verbose => {
            shell.notification("Check For Updates", &err.to_string());
        }
        UpdateOutcome::UpToDate | UpdateOutcome::CheckFailed(_) => {}
    }
}

async fn run_update_check(
    checker: Arc<UpdateChecker>,
    shell: Arc<dyn Shell>,
    verbose: bool,
) -> UpdateOutcome {
    let outcome = checker.check().await;
    report_update_outcome(shell.as_ref(), &outcome, verbose);
    outcome
}

/// Owns the backend worker and drives the shell.
pub struct LifecycleController {
    shell: Arc<dyn Shell>,
    backend: Arc<dyn BackendService>,
    bridge: CastBridge,
    settings: SettingsMirror,
    options: ControllerOptions,
    checker: Arc<UpdateChecker>,
    runtime: Runtime,
    state: ServiceState,
    worker: Option<Worker>,
    subscriptions: Vec<(Topic, SubscriptionId)>,
    now_playing: NowPlaying,
    initialized: bool,
}

impl LifecycleController {
    /// Creates a stopped controller. Nothing is read or started until
    /// [`LifecycleController::init`].
    pub fn new(
        shell: Arc<dyn Shell>,
        backend: Arc<dyn BackendService>,
        store: Box<dyn SettingsStore>,
        options: ControllerOptions,
    ) -> Result<Self, ControllerError> {
        let checker = UpdateChecker::new(
            options.update.endpoint.clone(),
            store.version(),
            Duration::from_secs(options.update.request_timeout_secs),
        )?;
        let runtime = build_runtime().map_err(ControllerError::Runtime)?;

        Ok(Self {
            shell,
            backend,
            bridge: CastBridge::new(),
            settings: SettingsMirror::new(store),
            options,
            checker: Arc::new(checker),
            runtime,
            state: ServiceState::Stopped,
            worker: None,
            subscriptions: Vec::new(),
            now_playing: Arc::default(),
            initialized: false,
        })
    }

    /// Replaces the release checker.
    #[must_use]
    pub fn with_update_checker(mut self, checker: UpdateChecker) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    pub const fn state(&self) -> ServiceState {
        self.state
    }

    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// The event bridge the backend publishes on.
    pub const fn bridge(&self) -> &CastBridge {
        &self.bridge
    }

    pub const fn settings(&self) -> &SettingsMirror {
        &self.settings
    }

    /// Number of live controller-owned subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// URI of the media currently playing, if any.
    pub fn now_playing(&self) -> Option<String> {
        lock(&self.now_playing).clone()
    }

    pub fn ip_address(&self) -> IpAddr {
        self.settings.store().ip_address()
    }

    pub fn version(&self) -> String {
        self.settings.store().version()
    }

    /// Loads settings, starts the backend and, if enabled, checks for a new
    /// release in the background. Meant to run once; later calls are ignored.
    pub fn init(&mut self) {
        if self.initialized {
            log::warn!("Controller is already initialized");
            return;
        }
        self.initialized = true;

        self.settings.load();
        if self.settings.start_at_login() {
            if let Err(err) = self.settings.reapply_start_at_login() {
                self.report_settings_error(&err);
            }
        }

        self.start_cast();

        if self.settings.check_update_on_startup() {
            // detached: the task reports its own outcome to the shell
            drop(self.check_update(false));
        }
        log::debug!("castbar started");
    }

    /// Starts the backend worker and subscribes the controller topics. Does
    /// nothing when already running.
    pub fn start_cast(&mut self) {
        if self.state.is_running() {
            log::debug!("Backend service is already running");
            return;
        }

        // subscribe first so events published during startup are not missed
        self.subscribe_topics();

        let (stopped_tx, stopped_rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let bridge = self.bridge.clone();
        let spawned = thread::Builder::new()
            .name("castbar-backend".to_string())
            .spawn(move || {
                backend.run(&bridge);
                if stopped_tx.send(()).is_err() {
                    log::debug!("Nobody is waiting for the backend worker to stop");
                }
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    stopped: stopped_rx,
                    stop_requested: false,
                });
                self.state = ServiceState::Running;
                log::info!("Backend service started");
            }
            Err(err) => {
                self.unsubscribe_topics();
                log::error!("Failed to spawn backend worker: {err}");
                self.shell
                    .on_backend_error(&format!("failed to start backend worker: {err}"));
            }
        }
    }

    /// Stops the backend and blocks until its worker has returned, then
    /// unsubscribes every controller topic.
    ///
    /// Calling this while stopped is a caller error reported as
    /// [`ControllerError::NotRunning`].
    pub fn stop_cast(&mut self) -> Result<(), ControllerError> {
        let Some(worker) = self.worker.as_mut() else {
            log::warn!("Stop requested while the backend service is stopped");
            return Err(ControllerError::NotRunning);
        };

        // a retry after a timeout must not leave a stop pending for the next run
        if worker.stop_requested {
            log::info!("Waiting again for the backend service to stop");
        } else {
            log::info!("Stopping backend service");
            self.backend.stop();
            worker.stop_requested = true;
        }

        match self.options.stop_timeout {
            Some(timeout) => match worker.stopped.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    log::error!("Backend worker did not stop within {timeout:?}");
                    return Err(ControllerError::StopTimedOut(timeout));
                }
            },
            None => {
                if worker.stopped.recv().is_err() {
                    log::warn!("Backend worker exited without signalling");
                }
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                log::error!("Backend worker panicked");
            }
        }

        self.state = ServiceState::Stopped;
        self.unsubscribe_topics();
        *lock(&self.now_playing) = None;
        log::info!("Backend service stopped");
        Ok(())
    }

    /// Stops a running service or starts a stopped one, returning the new
    /// state.
    pub fn toggle(&mut self) -> Result<ServiceState, ControllerError> {
        if self.state.is_running() {
            self.stop_cast()?;
        } else {
            self.start_cast();
        }
        Ok(self.state)
    }

    /// Stops the service if it runs. The shell ends its run loop afterwards.
    pub fn quit(&mut self) -> Result<(), ControllerError> {
        if self.state.is_running() {
            self.stop_cast()?;
        }
        Ok(())
    }

    /// Opens the project page.
    pub fn about(&self) {
        self.open_page(&self.options.update.project_page);
    }

    /// Checks for a new release on the controller's runtime without blocking
    /// the caller. The outcome is reported to the shell and also carried by
    /// the returned handle.
    pub fn check_update(&self, verbose: bool) -> tokio::task::JoinHandle<UpdateOutcome> {
        self.runtime.spawn(run_update_check(
            Arc::clone(&self.checker),
            Arc::clone(&self.shell),
            verbose,
        ))
    }

    /// Runs the release check to completion on the calling thread.
    ///
    /// Must not be called from within an async context.
    pub fn check_update_blocking(&self, verbose: bool) -> UpdateOutcome {
        self.runtime.block_on(run_update_check(
            Arc::clone(&self.checker),
            Arc::clone(&self.shell),
            verbose,
        ))
    }

    /// Registers or removes the login item; failures are notified.
    pub fn set_start_at_login(&mut self, enabled: bool) -> Result<(), SettingsError> {
        let result = self.settings.set_start_at_login(enabled);
        self.surface(result)
    }

    pub fn set_check_update_on_startup(&mut self, enabled: bool) -> Result<(), SettingsError> {
        let result = self.settings.set_check_update_on_startup(enabled);
        self.surface(result)
    }

    /// Changes the player size. [`PlayerSize::Auto`] also centres the player.
    pub fn set_player_size(&mut self, size: PlayerSize) -> Result<(), SettingsError> {
        let result = self.apply_player_size(size);
        self.surface(result)?;
        self.reload_renderer();
        Ok(())
    }

    pub fn set_player_position(&mut self, position: PlayerPosition) -> Result<(), SettingsError> {
        let result = self.settings.set_player_position(position);
        self.surface(result)?;
        self.reload_renderer();
        Ok(())
    }

    pub fn set_player_hardware_decode(
        &mut self,
        decode: PlayerHardwareDecode,
    ) -> Result<(), SettingsError> {
        let result = self.settings.set_player_hardware_decode(decode);
        self.surface(result)?;
        self.reload_renderer();
        Ok(())
    }

    fn apply_player_size(&mut self, size: PlayerSize) -> Result<(), SettingsError> {
        self.settings.set_player_size(size)?;
        if size == PlayerSize::Auto {
            self.settings.set_player_position(PlayerPosition::Center)?;
        }
        Ok(())
    }

    fn reload_renderer(&self) {
        if self.now_playing().is_some() {
            self.shell.notification("Reload Player", "please wait");
        }
        self.bridge.publish(&CastEvent::ReloadRenderer {
            preferences: self.settings.player_preferences(),
        });
    }

    fn open_page(&self, url: &str) {
        if let Err(err) = self.shell.open_browser(url) {
            log::warn!("{err}");
            self.shell.notification("Error", &err.to_string());
        }
    }

    fn report_settings_error(&self, err: &SettingsError) {
        log::error!("Failed to update settings: {err}");
        self.shell.notification("Error", &err.to_string());
    }

    fn surface(&self, result: Result<(), SettingsError>) -> Result<(), SettingsError> {
        if let Err(err) = &result {
            self.report_settings_error(err);
        }
        result
    }

    fn subscribe_topics(&mut self) {
        for topic in Topic::CONTROLLER_TOPICS {
            let shell = Arc::clone(&self.shell);
            let now_playing = Arc::clone(&self.now_playing);
            let id = self.bridge.subscribe(topic.name(), move |event: &CastEvent| {
                dispatch(shell.as_ref(), &now_playing, event);
            });
            self.subscriptions.push((topic, id));
        }
    }

    fn unsubscribe_topics(&mut self) {
        for (topic, id) in self.subscriptions.drain(..) {
            if !self.bridge.unsubscribe(topic.name(), id) {
                log::warn!("Subscription {id:?} on {topic} was already gone");
            }
        }
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.state.is_running() {
            if let Err(err) = self.stop_cast() {
                log::error!("Failed to stop backend service on shutdown: {err}");
            }
        }
    }
}
