//! Event log sinks
//!
//! Every component reports through the [`EventLog`] trait. Logging never fails
//! the caller: sinks swallow their own errors and fall back to stderr.

use drydock_core::domain::log::{LogEntry, LogLevel};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Sink for operational events
pub trait EventLog: Send + Sync {
    /// Records a message at the given severity
    fn log_event(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log_event(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log_event(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log_event(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log_event(LogLevel::Error, message);
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log_event(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Appends events to a plain text file
///
/// The file is reopened for every write so it can be removed or rotated
/// underneath a running daemon.
pub struct FileEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventLog {
    /// Creates a file sink, creating the parent directory
    ///
    /// # Arguments
    /// * `path` - Log file location
    /// * `truncate` - Clear any previous content
    pub fn open(path: impl Into<PathBuf>, truncate: bool) -> Self {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("Failed to create log folder {}: {}", parent.display(), e);
                }
            }
        }

        if truncate {
            if let Err(e) = fs::write(&path, b"") {
                eprintln!("Failed to clear log file {}: {}", path.display(), e);
            }
        }

        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.to_line().as_bytes())?;
        file.flush()
    }
}

impl EventLog for FileEventLog {
    fn log_event(&self, level: LogLevel, message: &str) {
        let entry = LogEntry::now(level, message);
        if let Err(e) = self.append(&entry) {
            eprintln!(
                "File logging failed: {}\nOriginal message: {}",
                e, message
            );
        }
    }
}

/// Writes every event to each inner sink
#[derive(Clone, Default)]
pub struct FanoutEventLog {
    sinks: Vec<Arc<dyn EventLog>>,
}

impl FanoutEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventLog>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventLog for FanoutEventLog {
    fn log_event(&self, level: LogLevel, message: &str) {
        for sink in &self.sinks {
            sink.log_event(level, message);
        }
    }
}

/// In-memory event buffer
///
/// Uses Arc<Mutex<Vec<LogEntry>>> so clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemoryEventLog {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the buffered entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if an entry at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.level == level && entry.message.contains(needle))
    }
}

impl EventLog for MemoryEventLog {
    fn log_event(&self, level: LogLevel, message: &str) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push(LogEntry::now(level, message));
    }
}

/// Writes a marker file recording when the daemon started
///
/// Best effort: failures go to stderr.
pub fn write_startup_marker(path: &Path) {
    let result = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| {
            fs::write(
                path,
                format!("Service started at {}\n", chrono::Local::now().to_rfc3339()),
            )
        });

    if let Err(e) = result {
        eprintln!("Failed to write startup file {}: {}", path.display(), e);
    }
}
