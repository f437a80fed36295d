//! System clipboard access
//!
//! [`ClipboardBackend`] is the seam between the watcher and the OS. The
//! daemon uses [`ArboardBackend`]; tests use an in-memory backend. Writing
//! falls back to external commands when the backend cannot own the
//! selection (headless sessions, compositors without data-control).

use std::io::Write;
use std::process::{Command, Stdio};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::utils::truncate_chars;

/// Clipboard access errors
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read clipboard: {0}")]
    Read(String),

    #[error("failed to write clipboard: {0}")]
    Write(String),

    #[error("{program} failed: {reason}")]
    Command { program: String, reason: String },
}

/// OS clipboard primitives.
///
/// Implementations are called from the blocking pool and must not assume
/// they run on the event loop thread.
pub trait ClipboardBackend: Send + Sync + 'static {
    /// Current text content, `Ok(None)` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>, ClipboardError>;

    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Monotonic counter bumped by every clipboard change, when the
    /// platform exposes one. `None` means changes must be found by reading.
    fn change_token(&self) -> Option<u64> {
        None
    }

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Backend over `arboard`, holding one clipboard handle for the daemon's life.
pub struct ArboardBackend {
    clipboard: Mutex<arboard::Clipboard>,
}

impl ArboardBackend {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

impl ClipboardBackend for ArboardBackend {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        match self.clipboard.lock().get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard
            .lock()
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "arboard"
    }
}

/// External command that reads the new clipboard text from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFallback {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandFallback {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Pipe `text` into the command and wait for it to exit successfully.
    pub fn run(&self, text: &str) -> Result<(), ClipboardError> {
        let fail = |reason: String| ClipboardError::Command {
            program: self.program.clone(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| fail(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(fail(e.to_string()));
            }
        }

        let status = child.wait().map_err(|e| fail(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(fail(format!("exited with {}", status)))
        }
    }
}

/// Wayland first, then the two common X11 tools.
pub fn default_fallbacks() -> Vec<CommandFallback> {
    vec![
        CommandFallback::new("wl-copy", &[]),
        CommandFallback::new("xclip", &["-selection", "clipboard"]),
        CommandFallback::new("xsel", &["--clipboard", "--input"]),
    ]
}

/// Put `text` on the clipboard, trying the backend and then each fallback.
///
/// Returns true on the first success. Every failure is logged.
pub fn set_clipboard_content(
    backend: &dyn ClipboardBackend,
    fallbacks: &[CommandFallback],
    text: &str,
) -> bool {
    match backend.write_text(text) {
        Ok(()) => {
            debug!(
                backend = backend.name(),
                preview = %truncate_chars(text, 50),
                "Set clipboard content"
            );
            return true;
        }
        Err(e) => warn!(backend = backend.name(), error = %e, "Backend clipboard write failed"),
    }

    for fallback in fallbacks {
        match fallback.run(text) {
            Ok(()) => {
                info!(program = %fallback.program, "Set clipboard content via fallback command");
                return true;
            }
            Err(e) => debug!(error = %e, "Clipboard fallback failed"),
        }
    }

    warn!(
        attempted = fallbacks.len() + 1,
        "Failed to set clipboard content with every method"
    );
    false
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend shared by the watcher and daemon tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    pub struct MemoryBackend {
        text: Mutex<Option<String>>,
        token: AtomicU64,
        with_token: bool,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        reads: AtomicU64,
    }

    impl MemoryBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Backend that exposes a change counter.
        pub fn with_change_token() -> Self {
            Self {
                with_token: true,
                ..Self::default()
            }
        }

        /// Simulate another application copying `text`.
        pub fn copy_external(&self, text: &str) {
            *self.text.lock() = Some(text.to_string());
            self.token.fetch_add(1, Ordering::SeqCst);
        }

        pub fn current(&self) -> Option<String> {
            self.text.lock().clone()
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn read_count(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ClipboardBackend for MemoryBackend {
        fn read_text(&self) -> Result<Option<String>, ClipboardError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ClipboardError::Read("simulated failure".to_string()));
            }
            Ok(self.text.lock().clone())
        }

        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ClipboardError::Write("simulated failure".to_string()));
            }
            self.copy_external(text);
            Ok(())
        }

        fn change_token(&self) -> Option<u64> {
            self.with_token
                .then(|| self.token.load(Ordering::SeqCst))
        }

        fn name(&self) -> &'static str {
            "memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryBackend;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_to_file(path: &std::path::Path) -> CommandFallback {
        CommandFallback::new("sh", &["-c", &format!("cat > '{}'", path.display())])
    }

    #[test]
    fn test_backend_write_wins_without_fallbacks() {
        let backend = MemoryBackend::new();
        assert!(set_clipboard_content(&backend, &[], "hello"));
        assert_eq!(backend.current().as_deref(), Some("hello"));
    }

    #[test]
    fn test_falls_back_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("clip.txt");
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);

        let fallbacks = vec![
            CommandFallback::new("cliplet-test-no-such-program", &[]),
            CommandFallback::new("false", &[]),
            write_to_file(&target),
        ];
        assert!(set_clipboard_content(&backend, &fallbacks, "via fallback"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "via fallback");
        assert!(backend.current().is_none());
    }

    #[test]
    fn test_command_exiting_before_reading_is_reaped() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("child.pid");
        let fallback = CommandFallback::new(
            "sh",
            &["-c", &format!("echo $$ > '{}'; exec true", pid_path.display())],
        );

        // Larger than a pipe buffer, so the write fails once the child exits
        let text = "x".repeat(1024 * 1024);
        match fallback.run(&text) {
            Err(ClipboardError::Command { program, .. }) => assert_eq!(program, "sh"),
            other => panic!("expected a command error, got {:?}", other),
        }

        let pid = fs::read_to_string(&pid_path).unwrap();
        let proc_entry = std::path::PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_entry.exists(), "child left behind as a zombie");
    }

    #[test]
    fn test_every_method_failing_returns_false() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let fallbacks = vec![CommandFallback::new("cliplet-test-no-such-program", &[])];
        assert!(!set_clipboard_content(&backend, &fallbacks, "x"));
    }

    #[test]
    fn test_default_fallback_order() {
        let programs: Vec<String> = default_fallbacks()
            .into_iter()
            .map(|f| f.program)
            .collect();
        assert_eq!(programs, vec!["wl-copy", "xclip", "xsel"]);
    }

    #[test]
    fn test_command_failure_reports_program() {
        let err = CommandFallback::new("false", &[]).run("x").unwrap_err();
        assert!(err.to_string().starts_with("false failed"));
    }
}
