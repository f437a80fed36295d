//! Configuration file IO
//!
//! Reads and writes the flat JSON object that backs [`ConfigManager`].

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{instrument, warn};

use super::schema;
use super::ConfigError;
use crate::utils::atomic_write;

/// Read `path` as a JSON object.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_config_file(path: &Path) -> Result<Option<Map<String, Value>>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: Value = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(ConfigError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Write `values` as pretty JSON with sorted keys.
pub fn write_config_file(path: &Path, values: &Map<String, Value>) -> Result<(), ConfigError> {
    // serde_json::Map is a BTreeMap without `preserve_order`, so keys come out sorted
    let json = serde_json::to_string_pretty(values).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    atomic_write(path, json.as_bytes()).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate every known key, dropping values that fail.
///
/// Unknown keys are ignored with a warning. Used by `load`, where one bad
/// value must not throw away the rest of the file.
#[instrument(name = "validate_config_lenient", skip(values))]
pub fn validate_lenient(values: Map<String, Value>) -> Map<String, Value> {
    let mut validated = Map::new();
    for (key, value) in values {
        if schema::lookup(&key).is_none() {
            warn!(key = %key, "Ignoring unknown configuration key");
            continue;
        }
        match schema::validate_value(&key, value) {
            Ok(value) => {
                validated.insert(key, value);
            }
            Err(e) => {
                warn!(error = %e, "Rejected configuration value, keeping default");
            }
        }
    }
    validated
}

/// Validate every known key, failing on the first bad value.
///
/// Unknown keys are ignored with a warning. Used by `update` and
/// `import_config`, which apply all values or none.
pub fn validate_strict(values: Map<String, Value>) -> Result<Map<String, Value>, ConfigError> {
    let mut validated = Map::new();
    for (key, value) in values {
        if schema::lookup(&key).is_none() {
            warn!(key = %key, "Ignoring unknown configuration key");
            continue;
        }
        let value = schema::validate_value(&key, value)?;
        validated.insert(key, value);
    }
    Ok(validated)
}
