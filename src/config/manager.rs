//! Schema-validated configuration store
//!
//! `ConfigManager` holds the flat key/value map the daemon runs with. It is
//! created once per process and passed to the components that need it.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use super::defaults::default_config;
use super::loader::{read_config_file, validate_lenient, validate_strict, write_config_file};
use super::schema::{self, KeySchema, CONFIG_SCHEMA};
use super::types::{ClassifierSettings, HistoryLimits, LogSettings};
use super::ConfigError;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_file: PathBuf,
    values: Map<String, Value>,
    loaded: bool,
}

impl ConfigManager {
    /// Create a manager holding defaults, without touching the filesystem.
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            values: default_config(),
            loaded: false,
        }
    }

    /// Create a manager and immediately load `config_file`.
    pub fn open(config_file: impl Into<PathBuf>) -> Self {
        let mut manager = Self::new(config_file);
        manager.load();
        manager
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load configuration from the file.
    ///
    /// Starts from defaults, then applies every valid value from the file.
    /// Invalid values are rejected one by one; unknown keys are ignored.
    /// When the file is missing a default file is written. Returns true
    /// only when values were read from disk.
    #[instrument(name = "config_load", skip(self), fields(path = %self.config_file.display()))]
    pub fn load(&mut self) -> bool {
        match read_config_file(&self.config_file) {
            Ok(Some(file_values)) => {
                let mut values = default_config();
                values.extend(validate_lenient(file_values));
                self.values = values;
                self.loaded = true;
                info!("Configuration loaded");
                true
            }
            Ok(None) => {
                info!("No configuration file found, using defaults");
                if let Err(e) = self.save() {
                    warn!(error = %e, "Failed to write default configuration file");
                }
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to load configuration, using current values");
                false
            }
        }
    }

    /// Write the current configuration to the file.
    pub fn save(&self) -> Result<(), ConfigError> {
        write_config_file(&self.config_file, &self.values)?;
        info!(path = %self.config_file.display(), "Configuration saved");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set one value after schema validation.
    ///
    /// Unknown keys are accepted without checks (forward compatibility).
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        if schema::lookup(key).is_none() {
            warn!(key = %key, "Unknown configuration key");
        }
        let value = schema::validate_value(key, value.into())?;
        debug!(key = %key, value = %value, "Configuration updated");
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Apply several values. Either all known values are applied or none.
    pub fn update(&mut self, values: Map<String, Value>) -> Result<usize, ConfigError> {
        let validated = validate_strict(values)?;
        let count = validated.len();
        self.values.extend(validated);
        debug!(count, "Configuration updated");
        Ok(count)
    }

    /// Reset one key, or everything when `key` is `None`.
    ///
    /// Returns false for an unknown key.
    pub fn reset(&mut self, key: Option<&str>) -> bool {
        let defaults = default_config();
        match key {
            Some(key) => match defaults.get(key) {
                Some(value) => {
                    self.values.insert(key.to_string(), value.clone());
                    info!(key = %key, "Configuration key reset to default");
                    true
                }
                None => {
                    warn!(key = %key, "Unknown configuration key");
                    false
                }
            },
            None => {
                self.values = defaults;
                info!("All configuration reset to defaults");
                true
            }
        }
    }

    /// Copy of every value.
    pub fn get_all(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// True when the current values were read from the file.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Check every known value against the schema.
    pub fn validate(&self) -> bool {
        validate_strict(self.values.clone()).is_ok()
    }

    pub fn get_schema(&self, key: &str) -> Option<&'static KeySchema> {
        schema::lookup(key)
    }

    pub fn schema(&self) -> &'static [KeySchema] {
        CONFIG_SCHEMA
    }

    pub fn export_config(&self, path: &Path) -> Result<(), ConfigError> {
        write_config_file(path, &self.values)?;
        info!(path = %path.display(), "Configuration exported");
        Ok(())
    }

    /// Import values from another file. Nothing is applied if any value fails.
    pub fn import_config(&mut self, path: &Path) -> Result<usize, ConfigError> {
        let values = read_config_file(path)?.ok_or_else(|| ConfigError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        let count = self.update(values)?;
        info!(path = %path.display(), count, "Configuration imported");
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Typed views
    // ---------------------------------------------------------------------

    pub fn history_limits(&self) -> HistoryLimits {
        let defaults = HistoryLimits::default();
        HistoryLimits {
            max_items: self
                .get_usize("max_history_items")
                .unwrap_or(defaults.max_items),
            min_text_length: self
                .get_usize("min_text_length")
                .unwrap_or(defaults.min_text_length),
            max_text_length: self
                .get_usize("max_text_length")
                .unwrap_or(defaults.max_text_length),
        }
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        let defaults = ClassifierSettings::default();
        ClassifierSettings {
            exclude_passwords: self
                .get_bool("exclude_passwords")
                .unwrap_or(defaults.exclude_passwords),
            password_max_length: self
                .get_usize("password_max_length")
                .unwrap_or(defaults.password_max_length),
            password_symbols: self
                .get_str("password_symbols")
                .map(str::to_string)
                .unwrap_or(defaults.password_symbols),
        }
    }

    pub fn log_settings(&self, log_dir: impl Into<PathBuf>) -> LogSettings {
        LogSettings {
            enabled: self.get_bool("enable_logging").unwrap_or(true),
            level: self.get_str("log_level").unwrap_or("INFO").to_string(),
            log_dir: log_dir.into(),
        }
    }

    pub fn save_on_exit(&self) -> bool {
        self.get_bool("save_on_exit").unwrap_or(true)
    }
}
