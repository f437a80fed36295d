//! Structured JSONL logging to a rolling file plus human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (`$XDG_DATA_HOME/cliplet/logs/cliplet.<date>.jsonl`),
//!   rotated daily with the five most recent files kept
//! - **Compact to stderr** - always on, for foreground runs and journald
//!
//! # Usage
//!
//! ```rust,ignore
//! use cliplet::logging;
//!
//! // Keep the guard alive until the daemon exits
//! let guard = logging::init(&config.log_settings(paths.log_dir()));
//! tracing::info!(event_type = "daemon_lifecycle", "Daemon started");
//! guard.shutdown();
//! ```
//!
//! # JSONL Output Format
//!
//! Each line is a valid JSON object:
//! ```json
//! {"timestamp":"2026-01-05T10:30:45.123Z","level":"INFO","target":"cliplet::daemon","fields":{"message":"History loaded","items":12}}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogSettings;

const LOG_FILE_PREFIX: &str = "cliplet";
const LOG_FILE_SUFFIX: &str = "jsonl";
const MAX_LOG_FILES: usize = 5;

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes buffered lines and closes the log file.
pub struct LoggingGuard {
    file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// True when a JSONL file layer is active.
    pub fn has_file_output(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Flush and close the log file.
    pub fn shutdown(self) {
        tracing::debug!(event_type = "daemon_lifecycle", "Flushing log output");
        drop(self.file_guard);
    }
}

/// Initialize the dual-output logging system.
///
/// `RUST_LOG` overrides the level from `settings`. If a global subscriber is
/// already installed (tests, embedding) the call is a no-op apart from the
/// returned guard. A log directory that cannot be created disables the file
/// layer instead of failing startup.
pub fn init(settings: &LogSettings) -> LoggingGuard {
    let (file_writer, file_guard) = if settings.enabled {
        match open_rolling_file(&settings.log_dir) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(writer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "[cliplet] Failed to open log directory {}: {}",
                    settings.log_dir.display(),
                    e
                );
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter_directive()));

    let json_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_span_events(FmtSpan::NONE)
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            event_type = "daemon_lifecycle",
            action = "logging_initialized",
            level = %settings.level,
            file_output = file_guard.is_some(),
            log_dir = %settings.log_dir.display(),
            "Logging initialized"
        );
    }

    LoggingGuard { file_guard }
}

fn open_rolling_file(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)?;
    Ok(appender)
}

/// Path of today's JSONL log file inside `log_dir`.
pub fn log_path(log_dir: &Path) -> PathBuf {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    log_dir.join(format!("{}.{}.{}", LOG_FILE_PREFIX, date, LOG_FILE_SUFFIX))
}

// =============================================================================
// STRUCTURED LOGGING HELPERS
// =============================================================================

/// Log a timed operation, escalating to WARN when it exceeds `threshold_ms`.
pub fn log_perf(operation: &str, duration_ms: u64, threshold_ms: u64) {
    if duration_ms > threshold_ms {
        tracing::warn!(
            event_type = "performance",
            operation = operation,
            duration_ms = duration_ms,
            threshold_ms = threshold_ms,
            is_slow = true,
            "Slow operation: {} took {}ms (threshold: {}ms)",
            operation,
            duration_ms,
            threshold_ms
        );
    } else {
        tracing::trace!(
            event_type = "performance",
            operation = operation,
            duration_ms = duration_ms,
            is_slow = false,
            "Operation {} completed in {}ms",
            operation,
            duration_ms
        );
    }
}
