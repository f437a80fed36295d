//! Process Manager Module
//!
//! Single-instance enforcement and control of a running daemon.
//!
//! This module provides:
//! - PID file at `$XDG_RUNTIME_DIR/cliplet/daemon.pid`, guarded by an
//!   exclusive `flock` held for the daemon's lifetime
//! - Liveness probing with signal 0 and stale marker cleanup
//! - Graceful-then-forced stop and reload requests for the CLI
//! - Status snapshots with process details from `sysinfo`

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Grace period after SIGKILL before reporting the outcome
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Interval between liveness checks while waiting for SIGTERM to land
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Attempts at locking a PID file that keeps being replaced underneath us
const LOCK_ATTEMPTS: usize = 5;

/// Pause before retrying a lock whose holder records no live PID
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum PidError {
    #[error("daemon already running with PID {pid}")]
    AlreadyRunning { pid: u32 },

    #[error("failed to access PID file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Result of [`PidManager::stop_process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// No live process held the PID file
    NotRunning,
    /// The process exited after SIGTERM
    Terminated,
    /// The process needed SIGKILL
    Killed,
    /// The process was still alive after SIGKILL
    Survived,
}

impl StopOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, StopOutcome::Survived)
    }
}

/// Details of a running daemon process
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetails {
    pub name: String,
    pub memory_bytes: u64,
    pub cpu_percent: f32,
    pub started_at: Option<DateTime<Utc>>,
}

/// Snapshot returned by [`PidManager::get_status`]
#[derive(Debug, Clone, Serialize)]
pub struct PidStatus {
    pub pid_file: PathBuf,
    pub pid: Option<u32>,
    pub exists: bool,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessDetails>,
}

/// Who holds the advisory lock on the PID file
enum MarkerLock {
    Missing,
    /// A live handle, possibly in this process, holds the lock
    Held,
    /// Nobody held it; the lock is now held through this file until dropped
    Free(File),
}

/// Owner of the daemon PID file.
#[derive(Debug)]
pub struct PidManager {
    pid_file: PathBuf,
    /// Open, locked PID file while this handle owns the marker
    lock: Option<File>,
}

impl PidManager {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            lock: None,
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// True while this handle holds the PID lock.
    pub fn is_owner(&self) -> bool {
        self.lock.is_some()
    }

    /// Take the PID lock and write the current process id.
    ///
    /// Fails with [`PidError::AlreadyRunning`] when any other open handle,
    /// in this process or another, holds the lock. A leftover file whose
    /// lock is free is stale and simply overwritten.
    pub fn create(&mut self) -> Result<(), PidError> {
        if self.lock.is_some() {
            return Err(PidError::AlreadyRunning {
                pid: std::process::id(),
            });
        }

        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut file = self.lock_marker()?;

        if let Some(stale) = read_pid_from(&mut file) {
            if stale != std::process::id() {
                info!(stale_pid = stale, "Replacing stale PID file");
            }
        }

        let pid = std::process::id();
        write_pid(&mut file, pid).map_err(|source| self.io_error(source))?;

        info!(pid, path = %self.pid_file.display(), "PID file created");
        self.lock = Some(file);
        Ok(())
    }

    /// Open and lock the file at `pid_file`, retrying when the path was
    /// unlinked or replaced between the open and the lock.
    fn lock_marker(&self) -> Result<File, PidError> {
        for attempt in 1..=LOCK_ATTEMPTS {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.pid_file)
                .map_err(|source| self.io_error(source))?;

            if let Err(e) = try_lock_exclusive(&file) {
                if e.kind() == io::ErrorKind::WouldBlock {
                    let pid = read_pid_from(&mut file);
                    // A stale-marker cleanup or a starting daemon holds it briefly
                    if !pid.is_some_and(is_process_alive) && attempt < LOCK_ATTEMPTS {
                        thread::sleep(LOCK_RETRY_DELAY);
                        continue;
                    }
                    let pid = pid.unwrap_or(0);
                    warn!(pid, path = %self.pid_file.display(), "PID file is locked by a running daemon");
                    return Err(PidError::AlreadyRunning { pid });
                }
                return Err(self.io_error(e));
            }

            if refers_to(&file, &self.pid_file) {
                return Ok(file);
            }
            debug!(attempt, "PID file replaced while locking, retrying");
        }

        Err(self.io_error(io::Error::other(
            "PID file kept changing while it was being locked",
        )))
    }

    /// Probe the lock from a separate descriptor.
    fn probe_lock(&self) -> io::Result<MarkerLock> {
        let file = match File::open(&self.pid_file) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MarkerLock::Missing),
            Err(e) => return Err(e),
        };
        match try_lock_exclusive(&file) {
            Ok(()) => Ok(MarkerLock::Free(file)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(MarkerLock::Held),
            Err(e) => Err(e),
        }
    }

    /// Unlink a marker nobody holds. `guard` keeps it locked until the
    /// unlink is done, so a daemon starting meanwhile cannot lose its marker.
    fn remove_stale(&self, guard: File) {
        match fs::remove_file(&self.pid_file) {
            Ok(()) => debug!(path = %self.pid_file.display(), "Stale PID file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Failed to remove stale PID file"),
        }
        drop(guard);
    }

    /// Delete the PID file and release the lock.
    pub fn remove(&mut self) -> Result<(), PidError> {
        let result = match fs::remove_file(&self.pid_file) {
            Ok(()) => {
                debug!(path = %self.pid_file.display(), "PID file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        };
        self.lock = None;
        result
    }

    /// PID recorded in the file, if it exists and parses.
    pub fn get_pid(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.pid_file).ok()?;
        contents.trim().parse().ok()
    }

    /// True while a daemon holds the PID lock. A marker whose lock is
    /// free is stale and removed, whatever PID it records.
    pub fn is_running(&mut self) -> bool {
        match self.probe_lock() {
            Ok(MarkerLock::Missing) => false,
            Ok(MarkerLock::Held) => true,
            Ok(MarkerLock::Free(guard)) => {
                info!(pid = ?self.get_pid(), "Removing stale PID file");
                self.remove_stale(guard);
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not probe PID file lock, falling back to signal 0");
                self.get_pid().is_some_and(is_process_alive)
            }
        }
    }

    /// Stop the recorded process: SIGTERM, wait up to `timeout_secs`
    /// polling once per second, then SIGKILL and a final short wait.
    ///
    /// A process that disappears at any point counts as stopped.
    pub fn stop_process(&mut self, timeout_secs: u64) -> Result<StopOutcome, PidError> {
        let pid = match self.get_pid() {
            Some(pid) if is_process_alive(pid) => pid,
            _ => {
                self.cleanup_after_stop();
                return Ok(StopOutcome::NotRunning);
            }
        };

        info!(pid, timeout_secs, "Sending SIGTERM");
        match send_signal(pid, libc::SIGTERM) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
                self.cleanup_after_stop();
                return Ok(StopOutcome::Terminated);
            }
            Err(source) => return Err(PidError::Signal { pid, source }),
        }

        for _ in 0..timeout_secs {
            thread::sleep(STOP_POLL_INTERVAL);
            if !is_process_alive(pid) {
                info!(pid, "Process terminated gracefully");
                self.cleanup_after_stop();
                return Ok(StopOutcome::Terminated);
            }
        }

        warn!(pid, "Process did not exit after SIGTERM, sending SIGKILL");
        match send_signal(pid, libc::SIGKILL) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
                self.cleanup_after_stop();
                return Ok(StopOutcome::Terminated);
            }
            Err(source) => return Err(PidError::Signal { pid, source }),
        }

        thread::sleep(KILL_WAIT);
        if is_process_alive(pid) {
            warn!(pid, "Process survived SIGKILL");
            Ok(StopOutcome::Survived)
        } else {
            self.cleanup_after_stop();
            Ok(StopOutcome::Killed)
        }
    }

    /// Ask the recorded process to reload its configuration (SIGHUP).
    pub fn reload_process(&mut self) -> bool {
        if !self.is_running() {
            warn!("No running daemon to reload");
            return false;
        }
        let Some(pid) = self.get_pid() else {
            return false;
        };
        match send_signal(pid, libc::SIGHUP) {
            Ok(()) => {
                info!(pid, "Sent reload signal");
                true
            }
            Err(e) => {
                warn!(pid, error = %e, "Failed to send reload signal");
                false
            }
        }
    }

    /// Snapshot of the PID file and, when alive, the process behind it.
    pub fn get_status(&mut self) -> PidStatus {
        let exists = self.pid_file.exists();
        let pid = self.get_pid();
        let running = self.is_running();
        let process = pid.filter(|_| running).and_then(process_details);

        PidStatus {
            pid_file: self.pid_file.clone(),
            pid,
            exists,
            running,
            process,
        }
    }

    fn cleanup_after_stop(&mut self) {
        if self.is_owner() {
            return;
        }
        match self.probe_lock() {
            Ok(MarkerLock::Free(guard)) => self.remove_stale(guard),
            Ok(MarkerLock::Missing) => {}
            Ok(MarkerLock::Held) => warn!("PID file is still locked, leaving it in place"),
            Err(e) => warn!(error = %e, "Failed to probe PID file after stop"),
        }
    }

    fn io_error(&self, source: io::Error) -> PidError {
        PidError::Io {
            path: self.pid_file.clone(),
            source,
        }
    }
}

fn try_lock_exclusive(file: &File) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and stays open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// True when `file` is still the inode linked at `path`.
fn refers_to(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

fn write_pid(file: &mut File, pid: u32) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", pid)?;
    file.sync_all()
}

fn read_pid_from(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn to_pid_t(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let Some(raw) = to_pid_t(pid) else {
        return Err(io::Error::from_raw_os_error(libc::ESRCH));
    };
    // SAFETY: kill has no memory-safety preconditions
    if unsafe { libc::kill(raw, signal) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Signal-0 probe. EPERM means the process exists under another user.
pub fn is_process_alive(pid: u32) -> bool {
    match send_signal(pid, 0) {
        Ok(()) => true,
        Err(e) => e.raw_os_error() == Some(libc::EPERM),
    }
}

fn process_details(pid: u32) -> Option<ProcessDetails> {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
    let process = system.process(sys_pid)?;

    Some(ProcessDetails {
        name: process.name().to_string_lossy().into_owned(),
        memory_bytes: process.memory(),
        cpu_percent: process.cpu_usage(),
        started_at: i64::try_from(process.start_time())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

// =============================================================================
// TESTS
// =============================================================================
