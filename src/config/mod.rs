//! Configuration module - daemon settings and user preferences
//!
//! This module provides functionality for:
//! - Loading configuration from `$XDG_CONFIG_HOME/cliplet/config.json`
//! - Default values for all settings
//! - Schema validation (type, bounds, choices, pattern) per key
//! - Typed views handed to the history store, classifier and logging
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `schema` - Per-key schema and value validation
//! - `types` - Typed settings structs (HistoryLimits, ClassifierSettings, ...)
//! - `loader` - File system loading and saving
//! - `manager` - The `ConfigManager` store

mod defaults;
mod loader;
mod manager;
mod schema;
mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use defaults::{
    DEFAULT_MAX_HISTORY_ITEMS, DEFAULT_MAX_TEXT_LENGTH, DEFAULT_MIN_TEXT_LENGTH,
    DEFAULT_PASSWORD_MAX_LENGTH, DEFAULT_PASSWORD_SYMBOLS,
};
pub use manager::ConfigManager;
pub use schema::{KeySchema, ValueType, CONFIG_SCHEMA};
pub use types::{ClassifierSettings, HistoryLimits, LogSettings};

/// Configuration errors. None of these stop the daemon; callers fall back
/// to defaults or keep the previous value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Validation { key: String, reason: String },

    #[error("failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file {path:?} does not contain a JSON object")]
    NotAnObject { path: PathBuf },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
