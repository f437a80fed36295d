use thiserror::Error;
use tracing::{error, warn};

use crate::clipboard_history::{ClipboardError, HistoryError};
use crate::config::ConfigError;
use crate::process_manager::PidError;

/// How loudly an error should be surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // logged only
    Warning,  // degraded, daemon keeps running
    Error,    // operation failed
    Critical, // startup aborted, non-zero exit
}

/// Domain-specific errors for Cliplet
#[derive(Error, Debug)]
pub enum ClipletError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error(transparent)]
    Pid(#[from] PidError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Event loop failed: {0}")]
    Runtime(#[source] std::io::Error),
}

impl ClipletError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(_) => ErrorSeverity::Warning,
            Self::History(_) => ErrorSeverity::Warning,
            Self::Clipboard(_) => ErrorSeverity::Warning,
            Self::Pid(PidError::AlreadyRunning { .. }) => ErrorSeverity::Critical,
            Self::Pid(_) => ErrorSeverity::Error,
            Self::Signal(_) => ErrorSeverity::Critical,
            Self::Runtime(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Config(e) => format!("Configuration issue: {}", e),
            Self::History(e) => format!("History storage issue: {}", e),
            Self::Clipboard(e) => format!("Clipboard unavailable: {}", e),
            Self::Pid(PidError::AlreadyRunning { pid }) => {
                format!("clipletd is already running with PID {}", pid)
            }
            Self::Pid(e) => format!("PID file issue: {}", e),
            Self::Signal(e) => format!("Could not install signal handlers: {}", e),
            Self::Runtime(e) => format!("Could not start the event loop: {}", e),
        }
    }

    /// The process exit status this error maps to at the binary edge.
    pub fn exit_code(&self) -> u8 {
        match self.severity() {
            ErrorSeverity::Info | ErrorSeverity::Warning => 0,
            ErrorSeverity::Error | ErrorSeverity::Critical => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClipletError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use cliplet::error::ResultExt;
///
/// // Keep running with an empty surface if closing it fails
/// surface.close().log_err();
///
/// // Expected to fail when the marker is already gone
/// fs::remove_file(&path).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_is_critical_with_pid_message() {
        let err = ClipletError::from(PidError::AlreadyRunning { pid: 4242 });
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.user_message(),
            "clipletd is already running with PID 4242"
        );
    }

    #[test]
    fn test_config_errors_degrade() {
        let err = ClipletError::from(ConfigError::Validation {
            key: "max_history_items".to_string(),
            reason: "value 500 is above maximum 100".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_log_err_maps_to_option() {
        let ok: std::result::Result<u32, String> = Ok(7);
        assert_eq!(ok.log_err(), Some(7));

        let err: std::result::Result<u32, String> = Err("boom".to_string());
        assert_eq!(err.warn_on_err(), None);
    }
}
