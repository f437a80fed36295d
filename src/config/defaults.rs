//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

use serde_json::{json, Map, Value};

/// Popup appearance
pub const DEFAULT_POPUP_WIDTH: i64 = 400;
pub const DEFAULT_POPUP_HEIGHT: i64 = 300;
pub const DEFAULT_POPUP_ITEMS_VISIBLE: i64 = 8;
pub const DEFAULT_POPUP_POSITION: &str = "cursor";
pub const DEFAULT_POPUP_TRANSPARENCY: f64 = 0.95;

/// History management
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 25;
pub const DEFAULT_AUTO_HIDE_DELAY: i64 = 10;
pub const DEFAULT_AUTO_CLEANUP_DAYS: i64 = 7;
pub const DEFAULT_SAVE_ON_EXIT: bool = true;

/// Privacy
pub const DEFAULT_EXCLUDE_PASSWORDS: bool = true;
/// Content shorter than this (in characters) is a password candidate
pub const DEFAULT_PASSWORD_MAX_LENGTH: usize = 50;
/// Any of these characters marks a short string as password-like
pub const DEFAULT_PASSWORD_SYMBOLS: &str = "!@#$%^&*";
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 1;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10_000;

/// Logging and housekeeping
pub const DEFAULT_ENABLE_LOGGING: bool = true;
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_CHECK_UPDATES: bool = true;
pub const DEFAULT_START_ON_LOGIN: bool = false;

/// UI preferences
pub const DEFAULT_THEME: &str = "system";
pub const DEFAULT_FONT_SIZE: i64 = 12;
pub const DEFAULT_SHOW_TIMESTAMPS: bool = true;
pub const DEFAULT_SHOW_PREVIEW: bool = true;

/// The complete default key/value map written to a fresh config file.
pub fn default_config() -> Map<String, Value> {
    let value = json!({
        "popup_width": DEFAULT_POPUP_WIDTH,
        "popup_height": DEFAULT_POPUP_HEIGHT,
        "popup_items_visible": DEFAULT_POPUP_ITEMS_VISIBLE,
        "popup_position": DEFAULT_POPUP_POSITION,
        "popup_transparency": DEFAULT_POPUP_TRANSPARENCY,

        "max_history_items": DEFAULT_MAX_HISTORY_ITEMS,
        "auto_hide_delay": DEFAULT_AUTO_HIDE_DELAY,
        "auto_cleanup_days": DEFAULT_AUTO_CLEANUP_DAYS,
        "save_on_exit": DEFAULT_SAVE_ON_EXIT,

        "excluded_apps": [],
        "exclude_passwords": DEFAULT_EXCLUDE_PASSWORDS,
        "password_max_length": DEFAULT_PASSWORD_MAX_LENGTH,
        "password_symbols": DEFAULT_PASSWORD_SYMBOLS,
        "min_text_length": DEFAULT_MIN_TEXT_LENGTH,
        "max_text_length": DEFAULT_MAX_TEXT_LENGTH,

        "enable_logging": DEFAULT_ENABLE_LOGGING,
        "log_level": DEFAULT_LOG_LEVEL,
        "check_updates": DEFAULT_CHECK_UPDATES,
        "start_on_login": DEFAULT_START_ON_LOGIN,

        "theme": DEFAULT_THEME,
        "font_size": DEFAULT_FONT_SIZE,
        "show_timestamps": DEFAULT_SHOW_TIMESTAMPS,
        "show_preview": DEFAULT_SHOW_PREVIEW,
    });

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
