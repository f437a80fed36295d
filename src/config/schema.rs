//! Configuration schema and per-value validation
//!
//! Each known key declares a value type plus optional numeric bounds,
//! enumerated choices and a string pattern. Values that arrive with a
//! convertible type (e.g. `"25"` for an integer) are coerced before checks.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use super::ConfigError;

/// Expected JSON type of a config value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
    List,
}

impl ValueType {
    fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Str => "str",
            ValueType::List => "list",
        }
    }
}

/// Schema for a single config key
#[derive(Debug, Clone, Serialize)]
pub struct KeySchema {
    pub key: &'static str,
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<&'static str>,
    pub description: &'static str,
}

fn no_choices(choices: &&'static [&'static str]) -> bool {
    choices.is_empty()
}

const fn int(key: &'static str, min: f64, max: f64, description: &'static str) -> KeySchema {
    KeySchema {
        key,
        value_type: ValueType::Int,
        min: Some(min),
        max: Some(max),
        choices: &[],
        pattern: None,
        description,
    }
}

const fn boolean(key: &'static str, description: &'static str) -> KeySchema {
    KeySchema {
        key,
        value_type: ValueType::Bool,
        min: None,
        max: None,
        choices: &[],
        pattern: None,
        description,
    }
}

const fn choice(
    key: &'static str,
    choices: &'static [&'static str],
    description: &'static str,
) -> KeySchema {
    KeySchema {
        key,
        value_type: ValueType::Str,
        min: None,
        max: None,
        choices,
        pattern: None,
        description,
    }
}

/// Every key the daemon and its surfaces understand.
pub static CONFIG_SCHEMA: &[KeySchema] = &[
    int("popup_width", 200.0, 800.0, "Popup window width in pixels"),
    int("popup_height", 150.0, 600.0, "Popup window height in pixels"),
    int(
        "popup_items_visible",
        3.0,
        20.0,
        "Number of clipboard items visible in popup",
    ),
    choice(
        "popup_position",
        &["cursor", "center", "fixed"],
        "Where to position the popup window",
    ),
    KeySchema {
        key: "popup_transparency",
        value_type: ValueType::Float,
        min: Some(0.1),
        max: Some(1.0),
        choices: &[],
        pattern: None,
        description: "Popup window transparency (0.1 = very transparent, 1.0 = opaque)",
    },
    int(
        "max_history_items",
        5.0,
        100.0,
        "Maximum number of clipboard items to keep",
    ),
    int("auto_hide_delay", 3.0, 60.0, "Seconds before popup auto-hides"),
    int(
        "auto_cleanup_days",
        1.0,
        365.0,
        "Days after which old clipboard items are removed",
    ),
    boolean("save_on_exit", "Save clipboard history when daemon exits"),
    KeySchema {
        key: "excluded_apps",
        value_type: ValueType::List,
        min: None,
        max: None,
        choices: &[],
        pattern: None,
        description: "List of application names to exclude from clipboard monitoring",
    },
    boolean(
        "exclude_passwords",
        "Exclude password-like text from clipboard monitoring",
    ),
    int(
        "password_max_length",
        1.0,
        1000.0,
        "Text shorter than this many characters may be treated as a password",
    ),
    KeySchema {
        key: "password_symbols",
        value_type: ValueType::Str,
        min: None,
        max: None,
        choices: &[],
        pattern: Some(r"^\S+$"),
        description: "Characters that mark short text as password-like",
    },
    int(
        "min_text_length",
        1.0,
        100.0,
        "Minimum text length to save to clipboard history",
    ),
    int(
        "max_text_length",
        100.0,
        100_000.0,
        "Maximum text length to save to clipboard history",
    ),
    boolean("enable_logging", "Enable application logging"),
    choice(
        "log_level",
        &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"],
        "Logging level",
    ),
    boolean("check_updates", "Check for application updates"),
    boolean("start_on_login", "Start daemon automatically on user login"),
    choice(
        "theme",
        &["system", "light", "dark"],
        "UI theme preference",
    ),
    int("font_size", 8.0, 24.0, "Font size for popup text"),
    boolean("show_timestamps", "Show timestamps for clipboard items"),
    boolean("show_preview", "Show preview of clipboard item content"),
];

/// Look up the schema for a key.
pub fn lookup(key: &str) -> Option<&'static KeySchema> {
    CONFIG_SCHEMA.iter().find(|schema| schema.key == key)
}

/// Compiled schema patterns, keyed by their source text
static PATTERN_CACHE: OnceLock<Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();

/// Compile `pattern` once and reuse it for every later validation.
pub(crate) fn compiled_pattern(pattern: &'static str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE.get_or_init(|| Mutex::new(HashMap::new())).lock();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    cache.insert(pattern, regex.clone());
    Ok(regex)
}

#[cfg(test)]
pub(crate) fn is_pattern_cached(pattern: &str) -> bool {
    PATTERN_CACHE
        .get()
        .is_some_and(|cache| cache.lock().contains_key(pattern))
}

/// Validate (and coerce) a single value.
///
/// Unknown keys pass through untouched for forward compatibility.
pub fn validate_value(key: &str, value: Value) -> Result<Value, ConfigError> {
    let Some(schema) = lookup(key) else {
        return Ok(value);
    };

    let invalid = |reason: String| ConfigError::Validation {
        key: key.to_string(),
        reason,
    };

    let value = coerce(schema.value_type, value).map_err(|got| {
        invalid(format!(
            "invalid type: expected {}, got {}",
            schema.value_type.name(),
            got
        ))
    })?;

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.min {
            if number < min {
                return Err(invalid(format!("value {} is below minimum {}", value, min)));
            }
        }
        if let Some(max) = schema.max {
            if number > max {
                return Err(invalid(format!("value {} is above maximum {}", value, max)));
            }
        }
    }

    if let Some(text) = value.as_str() {
        if !schema.choices.is_empty() && !schema.choices.contains(&text) {
            return Err(invalid(format!(
                "value '{}' not in allowed choices: {:?}",
                text, schema.choices
            )));
        }
        if let Some(pattern) = schema.pattern {
            let regex = compiled_pattern(pattern)
                .map_err(|e| invalid(format!("bad pattern {}: {}", pattern, e)))?;
            if !regex.is_match(text) {
                return Err(invalid(format!(
                    "value '{}' does not match required pattern",
                    text
                )));
            }
        }
    }

    Ok(value)
}

/// Convert `value` to `expected`, returning the JSON type name on failure.
fn coerce(expected: ValueType, value: Value) -> Result<Value, &'static str> {
    match (expected, value) {
        (ValueType::Int, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Ok(Value::from(f as i64))
            } else {
                Err("float")
            }
        }
        (ValueType::Int, Value::String(s)) => {
            s.trim().parse::<i64>().map(Value::from).map_err(|_| "str")
        }
        (ValueType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or("number"),
        (ValueType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or("str"),
        (ValueType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ValueType::Bool, Value::Number(n)) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
        (ValueType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err("str"),
        },
        (ValueType::Str, Value::String(s)) => Ok(Value::String(s)),
        (ValueType::Str, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ValueType::Str, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (ValueType::List, Value::Array(items)) => Ok(Value::Array(items)),
        (_, other) => Err(json_type_name(&other)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
