//! Daemon supervisor
//!
//! Owns the configuration, history store, clipboard watcher, PID marker and
//! an optional presentation surface, and runs the event loop that ties
//! them to OS signals:
//! - SIGTERM / SIGINT stop the daemon gracefully
//! - SIGHUP reloads the configuration without restarting the watcher

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use crate::clipboard_history::{
    ClipboardBackend, ClipboardEntry, ClipboardWatcher, HistoryStore, PasswordHeuristic,
    SharedHistory,
};
use crate::config::ConfigManager;
use crate::error::{ClipletError, Result, ResultExt};
use crate::paths::Paths;
use crate::process_manager::PidManager;

/// Supervisor lifecycle. Reload does not change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Stopped,
    Initializing,
    Running,
    Stopping,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DaemonState::Stopped => "stopped",
            DaemonState::Initializing => "initializing",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub history_item_count: usize,
    pub monitoring_active: bool,
    pub config_loaded: bool,
}

/// A UI that shows history and is closed when the daemon stops.
pub trait PresentationSurface: Send {
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Cloneable handle for requesting shutdown from outside the loop.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    shutdown: Arc<Notify>,
}

impl DaemonHandle {
    /// Ask the event loop to stop. A request made before the loop starts
    /// is remembered.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

struct Signals {
    terminate: Signal,
    interrupt: Signal,
    hangup: Signal,
}

impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }
}

pub struct Daemon {
    state: DaemonState,
    config: ConfigManager,
    store: SharedHistory,
    watcher: ClipboardWatcher,
    pid: PidManager,
    surface: Option<Box<dyn PresentationSurface>>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    /// Build the store (hydrated from disk) and a watcher bound to it.
    #[instrument(name = "daemon_init", skip_all)]
    pub fn new(config: ConfigManager, paths: &Paths, backend: Arc<dyn ClipboardBackend>) -> Self {
        info!(state = %DaemonState::Initializing, "Initializing daemon");

        let store: SharedHistory = Arc::new(Mutex::new(HistoryStore::open(
            paths.history_file(),
            config.history_limits(),
        )));
        let classifier = PasswordHeuristic::from_settings(&config.classifier_settings());
        let mut watcher = ClipboardWatcher::new(backend, Arc::clone(&store), Box::new(classifier));

        let observed_store = Arc::clone(&store);
        watcher.add_observer(Box::new(move |entry: &ClipboardEntry| {
            debug!(
                preview = %entry.preview(),
                kind = %entry.content_kind,
                count = observed_store.lock().len(),
                "Clipboard history updated"
            );
            Ok(())
        }));

        Self {
            state: DaemonState::Initializing,
            config,
            store,
            watcher,
            pid: PidManager::new(paths.pid_file()),
            surface: None,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.watcher = self.watcher.with_poll_interval(poll_interval);
        self
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Claim the PID marker and begin monitoring.
    ///
    /// Fails only when another instance holds the marker. Calling this
    /// while already running logs a warning and does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.state == DaemonState::Running {
            warn!("Daemon already running");
            return Ok(());
        }

        self.pid.create()?;
        self.watcher.start();
        self.state = DaemonState::Running;
        info!(
            pid = std::process::id(),
            history_items = self.store.lock().len(),
            "Daemon started"
        );
        Ok(())
    }

    /// Stop monitoring and release resources. Every step is attempted even
    /// when an earlier one fails.
    pub fn stop(&mut self) {
        if matches!(self.state, DaemonState::Stopped | DaemonState::Stopping) {
            return;
        }
        self.state = DaemonState::Stopping;
        info!("Stopping daemon");

        self.watcher.stop();

        if let Some(mut surface) = self.surface.take() {
            surface.close().log_err();
        }

        if self.config.save_on_exit() {
            if let Err(e) = self.store.lock().save() {
                error!(error = %e, "Failed to save history on exit");
            }
        }

        if self.pid.is_owner() {
            self.pid.remove().log_err();
        }

        self.state = DaemonState::Stopped;
        info!("Daemon stopped");
    }

    /// Start, then run the event loop until a stop signal or handle request.
    pub async fn run(&mut self) -> Result<()> {
        let mut signals = Signals::install().map_err(ClipletError::Signal)?;
        self.start()?;

        let result = self.event_loop(&mut signals).await;
        if let Err(e) = &result {
            error!(error = %e, "Event loop failed, shutting down");
        }
        self.stop();
        result
    }

    async fn event_loop(&mut self, signals: &mut Signals) -> Result<()> {
        while self.state == DaemonState::Running {
            tokio::select! {
                Some(()) = signals.terminate.recv() => {
                    info!(signal = "SIGTERM", "Shutdown signal received");
                    break;
                }
                Some(()) = signals.interrupt.recv() => {
                    info!(signal = "SIGINT", "Shutdown signal received");
                    break;
                }
                Some(()) = signals.hangup.recv() => {
                    info!(signal = "SIGHUP", "Reload signal received");
                    self.reload_config();
                }
                _ = self.shutdown.notified() => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.watcher.next_event() => self.watcher.handle_event(event),
            }
        }
        Ok(())
    }

    /// Re-read the config file and push the new limits and classifier
    /// settings into the running store and watcher.
    pub fn reload_config(&mut self) -> bool {
        let loaded = self.config.load();
        let limits = self.config.history_limits();
        self.store.lock().set_limits(limits);
        self.watcher
            .update_classifier(&self.config.classifier_settings());
        info!(
            loaded,
            max_items = limits.max_items,
            "Configuration reloaded"
        );
        loaded
    }

    pub fn get_status(&self) -> DaemonStatus {
        DaemonStatus {
            running: self.state == DaemonState::Running,
            history_item_count: self.store.lock().len(),
            monitoring_active: self.watcher.is_monitoring(),
            config_loaded: self.config.is_loaded(),
        }
    }

    pub fn history_items(&self, limit: Option<usize>) -> Vec<ClipboardEntry> {
        self.store.lock().items(limit)
    }

    pub fn clear_history(&self) {
        self.store.lock().clear();
    }

    pub fn set_clipboard_content(&self, text: &str) -> bool {
        self.watcher.set_clipboard_content(text)
    }

    pub fn attach_surface(&mut self, surface: Box<dyn PresentationSurface>) {
        if self.surface.replace(surface).is_some() {
            debug!("Replaced presentation surface");
        }
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }
}

/// Run a daemon on a current-thread runtime until it is told to stop.
pub fn run_daemon(
    config: ConfigManager,
    paths: &Paths,
    backend: Arc<dyn ClipboardBackend>,
) -> Result<()> {
    paths.ensure_directories().warn_on_err();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ClipletError::Runtime)?;

    let mut daemon = Daemon::new(config, paths, backend);
    runtime.block_on(daemon.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard_history::testing::MemoryBackend;
    use crate::process_manager::PidError;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        paths: Paths,
        backend: Arc<MemoryBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let paths = Paths::under(temp_dir.path());
            Self {
                temp_dir,
                paths,
                backend: Arc::new(MemoryBackend::new()),
            }
        }

        fn config(&self) -> ConfigManager {
            ConfigManager::open(self.paths.config_file())
        }

        fn daemon(&self) -> Daemon {
            Daemon::new(self.config(), &self.paths, self.backend.clone())
                .with_poll_interval(Duration::from_millis(20))
        }
    }

    /// `run()` installs process-wide signal handlers, and one test raises
    /// real signals, so tests that run the loop take turns.
    static RUN_SERIAL: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn raise(signal: libc::c_int) {
        // SAFETY: signalling our own process; `run()` has installed handlers
        assert_eq!(unsafe { libc::kill(libc::getpid(), signal) }, 0);
    }

    struct FlagSurface(Arc<AtomicBool>);

    impl PresentationSurface for FlagSurface {
        fn close(&mut self) -> anyhow::Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSurface;

    impl PresentationSurface for FailingSurface {
        fn close(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("window already gone")
        }
    }

    #[test]
    fn test_new_daemon_is_initializing() {
        let f = Fixture::new();
        let daemon = f.daemon();
        assert_eq!(daemon.state(), DaemonState::Initializing);
        assert_eq!(
            daemon.get_status(),
            DaemonStatus {
                running: false,
                history_item_count: 0,
                monitoring_active: false,
                // No config file existed, so defaults were written instead
                config_loaded: false,
            }
        );
    }

    #[test]
    fn test_start_and_stop_lifecycle() {
        let f = Fixture::new();
        let mut daemon = f.daemon();

        daemon.start().unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);
        assert!(daemon.get_status().monitoring_active);
        assert!(f.paths.pid_file().exists());

        // Second start is a no-op
        daemon.start().unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);

        daemon.stop();
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert!(!daemon.get_status().monitoring_active);
        assert!(!f.paths.pid_file().exists());
        // save_on_exit wrote the (empty) history
        assert!(f.paths.history_file().exists());
    }

    #[test]
    fn test_start_fails_when_instance_holds_marker() {
        let f = Fixture::new();
        let mut other = PidManager::new(f.paths.pid_file());
        other.create().unwrap();

        let mut daemon = f.daemon();
        match daemon.start() {
            Err(ClipletError::Pid(PidError::AlreadyRunning { pid })) => {
                assert_eq!(pid, std::process::id())
            }
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
        assert_ne!(daemon.state(), DaemonState::Running);
    }

    #[test]
    fn test_save_on_exit_disabled_skips_save() {
        let f = Fixture::new();
        let mut config = f.config();
        config.set("save_on_exit", false).unwrap();

        let mut daemon = Daemon::new(config, &f.paths, f.backend.clone());
        daemon.start().unwrap();
        daemon.stop();
        assert!(!f.paths.history_file().exists());
    }

    #[test]
    fn test_stop_closes_surface_and_survives_errors() {
        let f = Fixture::new();
        let closed = Arc::new(AtomicBool::new(false));

        let mut daemon = f.daemon();
        daemon.attach_surface(Box::new(FailingSurface));
        daemon.attach_surface(Box::new(FlagSurface(closed.clone())));
        daemon.start().unwrap();
        daemon.stop();
        assert!(closed.load(Ordering::SeqCst));

        let mut failing = f.daemon();
        failing.attach_surface(Box::new(FailingSurface));
        failing.start().unwrap();
        failing.stop();
        assert_eq!(failing.state(), DaemonState::Stopped);
        assert!(!f.paths.pid_file().exists());
    }

    #[tokio::test]
    async fn test_run_records_clipboard_until_shutdown() {
        let _serial = RUN_SERIAL.lock();
        let f = Fixture::new();
        let mut daemon = f.daemon();
        let handle = daemon.handle();
        let backend = f.backend.clone();

        let driver = async move {
            // Let the startup baseline read finish first
            tokio::time::sleep(Duration::from_millis(100)).await;
            backend.copy_external("copied while running");
            tokio::time::sleep(Duration::from_millis(300)).await;
            handle.request_shutdown();
        };
        let (result, ()) = tokio::join!(daemon.run(), driver);

        result.unwrap();
        assert_eq!(daemon.state(), DaemonState::Stopped);
        let items = daemon.history_items(None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "copied while running");
        assert!(!f.paths.pid_file().exists());
    }

    #[tokio::test]
    async fn test_shutdown_requested_before_run_is_honored() {
        let _serial = RUN_SERIAL.lock();
        let f = Fixture::new();
        let mut daemon = f.daemon();
        daemon.handle().request_shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), daemon.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[tokio::test]
    async fn test_signals_reload_then_stop_the_loop() {
        let _serial = RUN_SERIAL.lock();
        let f = Fixture::new();
        let mut daemon = f.daemon();
        let store = Arc::clone(&daemon.store);
        {
            let mut store = store.lock();
            for i in 0..8 {
                store.record(&format!("entry {}", i), Default::default());
            }
        }
        fs::write(f.paths.config_file(), r#"{"max_history_items": 5}"#).unwrap();

        let observed = Arc::clone(&store);
        let driver = async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            raise(libc::SIGHUP);
            tokio::time::sleep(Duration::from_millis(200)).await;
            let after_reload = observed.lock().len();
            raise(libc::SIGTERM);
            after_reload
        };
        let (result, after_reload) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(daemon.run(), driver)
        })
        .await
        .unwrap();

        result.unwrap();
        assert_eq!(after_reload, 5);
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert_eq!(daemon.history_items(None).len(), 5);
        assert_eq!(daemon.history_items(Some(1))[0].content, "entry 7");
        assert!(daemon.config().is_loaded());
        assert!(!f.paths.pid_file().exists());
    }

    #[test]
    fn test_reload_pushes_new_limits_into_store() {
        let f = Fixture::new();
        let mut daemon = f.daemon();
        {
            let mut store = daemon.store.lock();
            for i in 0..8 {
                store.record(&format!("entry {}", i), Default::default());
            }
        }
        assert_eq!(daemon.get_status().history_item_count, 8);

        fs::write(
            f.paths.config_file(),
            r#"{"max_history_items": 5, "exclude_passwords": false}"#,
        )
        .unwrap();
        assert!(daemon.reload_config());

        let status = daemon.get_status();
        assert_eq!(status.history_item_count, 5);
        assert!(status.config_loaded);
        assert_eq!(daemon.history_items(Some(1))[0].content, "entry 7");
        assert_eq!(daemon.state(), DaemonState::Initializing);
    }

    #[test]
    fn test_read_api() {
        let f = Fixture::new();
        let daemon = f.daemon();
        daemon.store.lock().record("keep me", Default::default());

        assert_eq!(daemon.history_items(None).len(), 1);
        assert!(daemon.set_clipboard_content("keep me"));
        assert_eq!(f.backend.current().as_deref(), Some("keep me"));

        daemon.clear_history();
        assert!(daemon.history_items(None).is_empty());
        drop(f.temp_dir);
    }
}
