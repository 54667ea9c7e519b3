//! Decoupled logging pipeline for matrix runs.
//!
//! # Architecture
//!
//! ```text
//! log::info!() / log::error!() / docker output
//!     |
//! [LogCollector] (log::Log impl)
//!     |                     \
//!     | (crossbeam channel)  stderr (synchronous echo)
//!     v
//! [DiskPersister thread]
//!     |
//! logs/full/<ts>_full.log      every line
//! logs/parsed/<ts>_parsed.log  target "parsed" only (milestones)
//! ```
//!
//! Disk writes happen on a plain OS thread so logging never blocks the
//! build and works the same inside or outside a Tokio runtime. When the log
//! directory is unusable, [`LogCollector::stderr_only`] keeps the echo and
//! drops the persister.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    /// Log type: "full" or "parsed"
    pub log_type: String,
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            log_type: "full".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            log_type: "parsed".to_string(),
            ..LogLine::new(message)
        }
    }

    fn formatted(&self) -> String {
        format!("[{}] {}\n", self.timestamp, self.message)
    }
}

/// Default log directory relative to the current working directory: ./logs
pub fn get_global_logs_path() -> Result<PathBuf, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Failed to get current working directory: {}", e))?;
    Ok(cwd.join("logs"))
}

/// Unified logger: echoes to stderr and persists to disk.
#[derive(Clone)]
pub struct LogCollector {
    /// `None` in stderr-only mode
    tx: Option<Sender<LogMessage>>,
    full_log_path: Option<PathBuf>,
    parsed_log_path: Option<PathBuf>,
    level: LevelFilter,
    echo: bool,
}

impl LogCollector {
    /// Create the log files under `log_dir` and start the persister thread.
    ///
    /// # Arguments
    /// * `log_dir` - Root directory; `full/` and `parsed/` are created inside
    /// * `level` - Maximum level accepted
    /// * `echo` - Also print every accepted record to stderr
    pub fn new(log_dir: &Path, level: LevelFilter, echo: bool) -> Result<Self, String> {
        let full_log_dir = log_dir.join("full");
        let parsed_log_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_log_dir)
            .map_err(|e| format!("Failed to create full log dir: {}", e))?;
        std::fs::create_dir_all(&parsed_log_dir)
            .map_err(|e| format!("Failed to create parsed log dir: {}", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let full_log_path = full_log_dir.join(format!("{}_full.log", stamp));
        let parsed_log_path = parsed_log_dir.join(format!("{}_parsed.log", stamp));

        let mut full_file = open_append(&full_log_path)?;
        let mut parsed_file = open_append(&parsed_log_path)?;

        let (tx, rx) = unbounded::<LogMessage>();

        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = line.formatted();
                        let _ = full_file.write_all(formatted.as_bytes());
                        if line.log_type == "parsed" {
                            let _ = parsed_file.write_all(formatted.as_bytes());
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = full_file.flush();
                        let _ = parsed_file.flush();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx: Some(tx),
            full_log_path: Some(full_log_path),
            parsed_log_path: Some(parsed_log_path),
            level,
            echo,
        })
    }

    /// Logger that only echoes to stderr, with no files and no persister thread.
    pub fn stderr_only(level: LevelFilter) -> Self {
        LogCollector {
            tx: None,
            full_log_path: None,
            parsed_log_path: None,
            level,
            echo: true,
        }
    }

    /// Register as the global `log` backend.
    pub fn install(self) -> Result<Self, String> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self.clone()))
            .map(|()| log::set_max_level(level))
            .map_err(|e| format!("Failed to set global logger: {}", e))?;
        Ok(self)
    }

    pub fn full_log_path(&self) -> Option<&Path> {
        self.full_log_path.as_deref()
    }

    pub fn parsed_log_path(&self) -> Option<&Path> {
        self.parsed_log_path.as_deref()
    }

    /// Send a log line (non-blocking). Dropped in stderr-only mode.
    pub fn log_line(&self, line: LogLine) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(LogMessage::Line(line));
        }
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log_line(LogLine::new(message.into()));
    }

    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log_line(LogLine::parsed(message.into()));
    }

    /// Block until every line sent before this call is on disk.
    pub fn wait_for_empty(&self) -> Result<(), String> {
        let Some(sender) = &self.tx else {
            return Ok(());
        };
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        sender
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

/// Wires all log::info!(), log::warn!(), log::error!() calls into LogCollector
impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = match record.target() {
            "docker" => format!("[docker] {}", record.args()),
            _ => format!("[{}] {}", record.level(), record.args()),
        };

        if self.echo {
            if record.level() <= Level::Warn || record.target() != "docker" {
                eprintln!("{}", message);
            } else {
                eprintln!("  {}", message);
            }
        }

        if record.target() == "parsed" {
            self.log_parsed(message);
        } else {
            self.log_str(message);
        }
    }

    fn flush(&self) {
        let _ = self.wait_for_empty();
    }
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}
