//! Cliplet - clipboard history daemon
//!
//! This library provides the daemon core: a bounded, deduplicated clipboard
//! history persisted to disk, the watcher that feeds it, and the supervisor
//! that ties both to OS signals and a single-instance PID marker.

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod utils;

// Clipboard capture and history storage
pub mod clipboard_history;

// Daemon lifecycle and process control
pub mod daemon;
pub mod process_manager;
