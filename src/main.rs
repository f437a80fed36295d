//! `clipletd` - clipboard history daemon and its control commands

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cliplet::clipboard_history::{
    default_fallbacks, ArboardBackend, ClipboardBackend, ClipboardEntry, HistoryStore,
};
use cliplet::config::{ConfigManager, LogSettings};
use cliplet::daemon::run_daemon;
use cliplet::error::{ClipletError, ErrorSeverity};
use cliplet::logging;
use cliplet::paths::Paths;
use cliplet::process_manager::{PidManager, StopOutcome};
use cliplet::utils::truncate_chars;

/// Seconds `stop` waits for a graceful exit before SIGKILL
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(name = "clipletd", version, about = "Clipboard history daemon")]
struct Cli {
    /// Use this config file instead of $XDG_CONFIG_HOME/cliplet/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    /// Keep config, data, cache and runtime files beneath this directory
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon in the foreground (default)
    Run,
    /// Stop a running daemon
    Stop {
        /// Seconds to wait after SIGTERM before SIGKILL
        #[arg(long, default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Ask a running daemon to reload its configuration
    Reload,
    /// Show whether the daemon is running
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Print the recorded clipboard history
    History {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Delete the recorded history (daemon must be stopped)
    Clear,
    /// Put a history entry back on the clipboard
    Copy {
        /// Position in the history, 0 is the most recent
        index: usize,
    },
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match cli.root.as_deref() {
        Some(root) => Paths::under(expand(root)),
        None => Paths::resolve(),
    };
    let config_file = cli
        .config
        .as_deref()
        .map(expand)
        .unwrap_or_else(|| paths.config_file());
    let config = ConfigManager::open(config_file);

    let command = cli.command.unwrap_or(Command::Run);
    let log_settings = match command {
        Command::Run => config.log_settings(paths.log_dir()),
        _ => LogSettings {
            enabled: false,
            level: "WARNING".to_string(),
            log_dir: paths.log_dir(),
        },
    };
    let log_guard = logging::init(&log_settings);

    let code = match command {
        Command::Run => run(config, &paths),
        Command::Stop { timeout } => stop(&paths, timeout),
        Command::Reload => reload(&paths),
        Command::Status { json } => status(&paths, json),
        Command::History { limit, json } => history(&config, &paths, limit, json),
        Command::Clear => clear(&config, &paths),
        Command::Copy { index } => copy(&config, &paths, index),
    };

    log_guard.shutdown();
    code
}

fn run(config: ConfigManager, paths: &Paths) -> ExitCode {
    let backend = match ArboardBackend::new() {
        Ok(backend) => backend,
        Err(e) => return report(ClipletError::from(e)),
    };

    match run_daemon(config, paths, Arc::new(backend)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(e: ClipletError) -> ExitCode {
    match e.severity() {
        ErrorSeverity::Info | ErrorSeverity::Warning => info!(error = %e, "Daemon exited"),
        ErrorSeverity::Error | ErrorSeverity::Critical => error!(error = %e, "Daemon failed"),
    }
    eprintln!("{}", e.user_message());
    ExitCode::from(e.exit_code().max(1))
}

fn stop(paths: &Paths, timeout: u64) -> ExitCode {
    let mut pid = PidManager::new(paths.pid_file());
    match pid.stop_process(timeout) {
        Ok(StopOutcome::NotRunning) => {
            eprintln!("clipletd is not running");
            ExitCode::FAILURE
        }
        Ok(StopOutcome::Terminated) => {
            println!("clipletd stopped");
            ExitCode::SUCCESS
        }
        Ok(StopOutcome::Killed) => {
            println!("clipletd did not exit in {}s and was killed", timeout);
            ExitCode::SUCCESS
        }
        Ok(StopOutcome::Survived) => {
            eprintln!("clipletd could not be stopped");
            ExitCode::FAILURE
        }
        Err(e) => report(e.into()),
    }
}

fn reload(paths: &Paths) -> ExitCode {
    let mut pid = PidManager::new(paths.pid_file());
    if pid.reload_process() {
        println!("Reload requested");
        ExitCode::SUCCESS
    } else {
        eprintln!("clipletd is not running");
        ExitCode::FAILURE
    }
}

fn status(paths: &Paths, json: bool) -> ExitCode {
    let status = PidManager::new(paths.pid_file()).get_status();

    if json {
        match serde_json::to_string_pretty(&status) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to encode status: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else if let (true, Some(pid)) = (status.running, status.pid) {
        println!("clipletd is running (PID {})", pid);
        if let Some(process) = &status.process {
            println!("  process: {}", process.name);
            println!(
                "  memory:  {:.1} MiB",
                process.memory_bytes as f64 / (1024.0 * 1024.0)
            );
            if let Some(started_at) = process.started_at {
                println!("  started: {}", started_at.to_rfc3339());
            }
        }
    } else {
        println!("clipletd is not running");
    }

    if status.running {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn open_store(config: &ConfigManager, paths: &Paths) -> HistoryStore {
    HistoryStore::open(paths.history_file(), config.history_limits())
}

fn history(config: &ConfigManager, paths: &Paths, limit: Option<usize>, json: bool) -> ExitCode {
    let entries = open_store(config, paths).items(limit);

    if json {
        return match serde_json::to_string_pretty(&entries) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to encode history: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if entries.is_empty() {
        println!("Clipboard history is empty");
    }
    for (index, entry) in entries.iter().enumerate() {
        println!("{:>3}  {}  {}", index, format_time(entry), entry.preview());
    }
    ExitCode::SUCCESS
}

fn format_time(entry: &ClipboardEntry) -> String {
    entry
        .captured_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn clear(config: &ConfigManager, paths: &Paths) -> ExitCode {
    if PidManager::new(paths.pid_file()).is_running() {
        eprintln!("clipletd is running; stop it before clearing the history");
        return ExitCode::FAILURE;
    }
    open_store(config, paths).clear();
    println!("Clipboard history cleared");
    ExitCode::SUCCESS
}

fn copy(config: &ConfigManager, paths: &Paths, index: usize) -> ExitCode {
    let entries = open_store(config, paths).items(None);
    let Some(entry) = entries.get(index) else {
        eprintln!(
            "No history entry at index {} ({} entries)",
            index,
            entries.len()
        );
        return ExitCode::FAILURE;
    };

    match copy_text(&entry.content) {
        Ok(()) => {
            println!("Copied: {}", truncate_chars(&entry.preview(), 60));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to set clipboard content: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// External commands keep serving the selection after this short-lived
/// process exits, so they are tried before the in-process backend.
fn copy_text(text: &str) -> anyhow::Result<()> {
    for fallback in default_fallbacks() {
        if fallback.run(text).is_ok() {
            return Ok(());
        }
    }
    let backend = ArboardBackend::new().context("no clipboard command available")?;
    backend
        .write_text(text)
        .context("clipboard backend rejected the write")
}
