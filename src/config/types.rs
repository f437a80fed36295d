//! Typed views over the flat configuration map
//!
//! Components never read raw keys; they receive one of these structs built
//! by [`ConfigManager`](super::ConfigManager) and pushed in at construction
//! or on reload.

use std::path::PathBuf;

use serde::Serialize;

use super::defaults::*;

/// Bounds applied by the history store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryLimits {
    /// Maximum number of entries kept (tail is trimmed past this)
    pub max_items: usize,
    /// Minimum accepted content length in characters
    pub min_text_length: usize,
    /// Maximum accepted content length in characters
    pub max_text_length: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        HistoryLimits {
            max_items: DEFAULT_MAX_HISTORY_ITEMS,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

/// Settings for the password-like content heuristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierSettings {
    pub exclude_passwords: bool,
    pub password_max_length: usize,
    pub password_symbols: String,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings {
            exclude_passwords: DEFAULT_EXCLUDE_PASSWORDS,
            password_max_length: DEFAULT_PASSWORD_MAX_LENGTH,
            password_symbols: DEFAULT_PASSWORD_SYMBOLS.to_string(),
        }
    }
}

/// Settings consumed by `logging::init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Write the JSONL log file (stderr output is always on)
    pub enabled: bool,
    /// One of DEBUG, INFO, WARNING, ERROR, CRITICAL
    pub level: String,
    pub log_dir: PathBuf,
}

impl LogSettings {
    /// Translate the config level name into an `EnvFilter` directive.
    pub fn filter_directive(&self) -> &'static str {
        match self.level.to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }
}
