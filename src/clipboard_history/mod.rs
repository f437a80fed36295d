//! Clipboard History Module
//!
//! Bounded, deduplicated clipboard history with background monitoring.
//!
//! ## Features
//! - Most-recent-first history persisted as a JSON file (atomic replace)
//! - Duplicate captures promoted to the top instead of stored twice
//! - Password-like content excluded by a pluggable classifier
//! - Change-token based polling when the backend supports it
//! - Observer fan-out for accepted entries
//!
//! ## Module Structure
//! - `types`: Core types (ContentKind, ClipboardEntry)
//! - `store`: History storage and persistence
//! - `classifier`: Sensitive-content detection
//! - `clipboard`: System clipboard backend and write fallbacks
//! - `change_detection`: Change token tracking
//! - `monitor`: The clipboard watcher driven by the daemon loop

mod change_detection;
mod classifier;
mod clipboard;
mod monitor;
mod store;
mod types;

use std::sync::Arc;

use parking_lot::Mutex;

pub use change_detection::ChangeDetector;
pub use classifier::{ContentClassifier, PasswordHeuristic};
pub use clipboard::{
    default_fallbacks, set_clipboard_content, ArboardBackend, ClipboardBackend, ClipboardError,
    CommandFallback,
};
pub use monitor::{ClipboardWatcher, Observer, ReadOutcome, WatcherEvent};
pub use store::{HistoryError, HistoryStore};
pub use types::{parse_timestamp, ClipboardEntry, ContentKind, PREVIEW_MAX_CHARS};

#[cfg(test)]
pub(crate) use clipboard::testing;

/// History store shared between the watcher and the daemon's read API.
pub type SharedHistory = Arc<Mutex<HistoryStore>>;
