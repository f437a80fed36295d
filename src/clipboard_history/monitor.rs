//! Clipboard monitoring
//!
//! [`ClipboardWatcher`] turns clipboard changes into history entries. It is
//! driven by the daemon's event loop: `next_event` waits for the next poll
//! tick, read completion or queued observer delivery, and `handle_event`
//! applies it. Payload reads run on the blocking pool so a slow clipboard
//! owner never stalls signal handling.

use std::future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::change_detection::ChangeDetector;
use super::classifier::{ContentClassifier, PasswordHeuristic};
use super::clipboard::{self, ClipboardBackend, ClipboardError, CommandFallback};
use super::types::{ClipboardEntry, ContentKind};
use super::SharedHistory;
use crate::config::ClassifierSettings;
use crate::logging;

/// Polling interval when every poll has to read the payload
const POLL_INTERVAL_MS: u64 = 500;

/// Polling interval when the backend exposes a cheap change token
const FAST_POLL_INTERVAL_MS: u64 = 50;

/// Reads slower than this are logged as warnings
const SLOW_READ_THRESHOLD_MS: u64 = 250;

/// Capacity of the observer delivery queue
const DELIVERY_QUEUE_CAPACITY: usize = 100;

/// Callback run for every accepted entry. Errors are logged, never propagated.
pub type Observer = Box<dyn Fn(&ClipboardEntry) -> anyhow::Result<()> + Send + Sync>;

type ReadResult = Result<Option<String>, ClipboardError>;

/// Something the event loop should hand back to [`ClipboardWatcher::handle_event`].
#[derive(Debug)]
pub enum WatcherEvent {
    /// Poll interval elapsed
    Tick,
    /// The in-flight clipboard read resolved
    ReadFinished(ReadResult),
    /// An accepted entry is ready for observers
    Deliver(ClipboardEntry),
}

/// How a clipboard read resolved, relative to the last observed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    NewContent(String),
    Unchanged,
    Failed,
}

pub struct ClipboardWatcher {
    backend: Arc<dyn ClipboardBackend>,
    store: SharedHistory,
    classifier: Box<dyn ContentClassifier>,
    detector: ChangeDetector,
    fallbacks: Vec<CommandFallback>,
    observers: Vec<Observer>,

    monitoring: bool,
    poll_interval: Duration,
    poll: Option<Interval>,

    /// Content seen by the last successful read
    last_observed: Option<String>,
    /// Set by `start`; the first loop turn reads the clipboard as a baseline
    awaiting_baseline: bool,
    /// The in-flight read only seeds `last_observed`
    baseline_read: bool,
    pending_read: Option<JoinHandle<ReadResult>>,
    read_started: Option<Instant>,
    /// A change arrived while a read was in flight
    reread_requested: bool,

    deliveries_tx: async_channel::Sender<ClipboardEntry>,
    deliveries_rx: async_channel::Receiver<ClipboardEntry>,
}

impl ClipboardWatcher {
    pub fn new(
        backend: Arc<dyn ClipboardBackend>,
        store: SharedHistory,
        classifier: Box<dyn ContentClassifier>,
    ) -> Self {
        let poll_interval = if backend.change_token().is_some() {
            Duration::from_millis(FAST_POLL_INTERVAL_MS)
        } else {
            Duration::from_millis(POLL_INTERVAL_MS)
        };
        let (deliveries_tx, deliveries_rx) = async_channel::bounded(DELIVERY_QUEUE_CAPACITY);

        Self {
            backend,
            store,
            classifier,
            detector: ChangeDetector::new(),
            fallbacks: clipboard::default_fallbacks(),
            observers: Vec::new(),
            monitoring: false,
            poll_interval,
            poll: None,
            last_observed: None,
            awaiting_baseline: false,
            baseline_read: false,
            pending_read: None,
            read_started: None,
            reread_requested: false,
            deliveries_tx,
            deliveries_rx,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<CommandFallback>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Begin listening. Returns false (and changes nothing) when already started.
    pub fn start(&mut self) -> bool {
        if self.monitoring {
            warn!("Clipboard monitoring already active");
            return false;
        }
        self.monitoring = true;
        self.awaiting_baseline = true;
        self.detector.reset();
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            backend = self.backend.name(),
            has_change_detection = self.backend.change_token().is_some(),
            "Started clipboard monitoring"
        );
        true
    }

    /// Stop listening. A read still in flight is discarded when it resolves.
    pub fn stop(&mut self) {
        if !self.monitoring {
            return;
        }
        self.monitoring = false;
        self.poll = None;
        self.reread_requested = false;
        info!("Stopped clipboard monitoring");
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Register a callback for accepted entries.
    pub fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
        debug!(count = self.observers.len(), "Added clipboard observer");
    }

    /// Swap the sensitive-content classifier.
    pub fn set_classifier(&mut self, classifier: Box<dyn ContentClassifier>) {
        self.classifier = classifier;
    }

    /// Rebuild the password heuristic from new settings (reload path).
    pub fn update_classifier(&mut self, settings: &ClassifierSettings) {
        self.classifier = Box::new(PasswordHeuristic::from_settings(settings));
        debug!(
            exclude_passwords = settings.exclude_passwords,
            password_max_length = settings.password_max_length,
            "Classifier settings updated"
        );
    }

    /// Put `text` on the system clipboard. See [`clipboard::set_clipboard_content`].
    pub fn set_clipboard_content(&self, text: &str) -> bool {
        clipboard::set_clipboard_content(self.backend.as_ref(), &self.fallbacks, text)
    }

    /// External change notification. Starts a read, or coalesces into a
    /// single follow-up read when one is already in flight.
    pub fn notify_changed(&mut self) {
        if !self.monitoring {
            return;
        }
        if self.pending_read.is_some() {
            self.reread_requested = true;
            return;
        }
        self.spawn_read();
    }

    fn spawn_read(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.read_started = Some(Instant::now());
        self.pending_read = Some(tokio::task::spawn_blocking(move || backend.read_text()));
    }

    /// Read whatever is on the clipboard at startup without recording it.
    /// Skipped when a change notification already started a read.
    fn begin_baseline(&mut self) {
        self.awaiting_baseline = false;
        if self.pending_read.is_some() {
            return;
        }
        self.detector.has_changed(self.backend.change_token());
        self.baseline_read = true;
        self.spawn_read();
    }

    /// Wait for the next event. Cancel-safe: dropping the future loses nothing.
    pub async fn next_event(&mut self) -> WatcherEvent {
        if self.monitoring && self.poll.is_none() {
            let start = tokio::time::Instant::now() + self.poll_interval;
            let mut poll = tokio::time::interval_at(start, self.poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.poll = Some(poll);
        }
        if self.monitoring && self.awaiting_baseline {
            self.begin_baseline();
        }

        tokio::select! {
            biased;
            Ok(entry) = self.deliveries_rx.recv() => WatcherEvent::Deliver(entry),
            result = wait_for_read(&mut self.pending_read) => {
                self.pending_read = None;
                WatcherEvent::ReadFinished(result)
            }
            _ = wait_for_tick(&mut self.poll) => WatcherEvent::Tick,
        }
    }

    pub fn handle_event(&mut self, event: WatcherEvent) {
        match event {
            WatcherEvent::Tick => self.on_tick(),
            WatcherEvent::ReadFinished(result) => self.on_read_finished(result),
            WatcherEvent::Deliver(entry) => self.deliver(&entry),
        }
    }

    fn on_tick(&mut self) {
        if !self.monitoring {
            return;
        }
        let changed = self
            .detector
            .has_changed(self.backend.change_token())
            .unwrap_or(true);
        if changed {
            self.notify_changed();
        }
    }

    fn on_read_finished(&mut self, result: ReadResult) {
        if let Some(started) = self.read_started.take() {
            logging::log_perf(
                "clipboard_read",
                started.elapsed().as_millis() as u64,
                SLOW_READ_THRESHOLD_MS,
            );
        }

        let baseline = std::mem::take(&mut self.baseline_read);
        if !self.monitoring {
            debug!("Discarding clipboard read that finished after stop");
            return;
        }

        match self.resolve_read(result) {
            ReadOutcome::NewContent(content) if baseline => {
                debug!(chars = content.chars().count(), "Clipboard baseline captured");
            }
            ReadOutcome::NewContent(content) => self.accept(content),
            ReadOutcome::Unchanged | ReadOutcome::Failed => {}
        }

        if std::mem::take(&mut self.reread_requested) {
            self.notify_changed();
        }
    }

    fn resolve_read(&mut self, result: ReadResult) -> ReadOutcome {
        match result {
            Ok(Some(content)) => {
                if self.last_observed.as_deref() == Some(content.as_str()) {
                    return ReadOutcome::Unchanged;
                }
                self.last_observed = Some(content.clone());
                ReadOutcome::NewContent(content)
            }
            Ok(None) => ReadOutcome::Unchanged,
            Err(e) => {
                warn!(error = %e, "Failed to read clipboard");
                ReadOutcome::Failed
            }
        }
    }

    fn accept(&mut self, content: String) {
        if self.classifier.is_sensitive(&content) {
            debug!("Excluded sensitive content from clipboard history");
            return;
        }

        let recorded = self.store.lock().record(&content, ContentKind::Text);
        let Some(entry) = recorded else {
            return;
        };

        if let Err(e) = self.deliveries_tx.try_send(entry) {
            warn!(error = %e, "Observer queue full, dropping notification");
        }
    }

    fn deliver(&self, entry: &ClipboardEntry) {
        for (index, observer) in self.observers.iter().enumerate() {
            if let Err(e) = observer(entry) {
                error!(observer = index, error = %e, "Error in clipboard observer");
            }
        }
    }
}

async fn wait_for_read(pending: &mut Option<JoinHandle<ReadResult>>) -> ReadResult {
    match pending {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(ClipboardError::Read(format!("read task failed: {}", e))),
        },
        None => future::pending().await,
    }
}

async fn wait_for_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(poll) => {
            poll.tick().await;
        }
        None => future::pending().await,
    }
}
