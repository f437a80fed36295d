//! Filesystem layout
//!
//! Resolves the XDG directories used by the daemon. Every component receives
//! a [`Paths`] value at construction instead of looking locations up itself,
//! so tests can point the whole daemon at a temporary directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application directory name under each XDG base directory
pub const APP_DIR_NAME: &str = "cliplet";

const CONFIG_FILE_NAME: &str = "config.json";
const HISTORY_FILE_NAME: &str = "history.json";
const PID_FILE_NAME: &str = "daemon.pid";

/// Resolved directory layout for one daemon instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub runtime_dir: PathBuf,
}

impl Paths {
    /// Resolve from the XDG environment, falling back to `~/.config`,
    /// `~/.local/share` and `~/.cache` when the variables are unset.
    pub fn resolve() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| home.join(".config"))
            .join(APP_DIR_NAME);
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| home.join(".local").join("share"))
            .join(APP_DIR_NAME);
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| home.join(".cache"))
            .join(APP_DIR_NAME);
        let runtime_dir = dirs::runtime_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| cache_dir.join("runtime"));

        Self {
            config_dir,
            data_dir,
            cache_dir,
            runtime_dir,
        }
    }

    /// Lay every directory out beneath a single root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            runtime_dir: root.join("runtime"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join(PID_FILE_NAME)
    }

    /// Create every directory in the layout.
    pub fn ensure_directories(&self) -> io::Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.log_dir(),
            &self.runtime_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::resolve()
    }
}
