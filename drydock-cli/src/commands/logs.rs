//! Event log reader
//!
//! One-shot view of the daemon's plain-file log, oldest first, colored by
//! level. Lines that do not parse are shown as they are.

use anyhow::{Context, Result};
use colored::*;
use drydock_core::domain::log::{LogEntry, LogLevel, LogRecord, parse_log};
use std::path::PathBuf;

use crate::config::Config;

/// Which records to show
#[derive(Debug, Default)]
struct LogFilter {
    min_level: Option<LogLevel>,
    tail: Option<usize>,
    grep: Option<String>,
}

impl LogFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        let (level, text) = match record {
            LogRecord::Entry(entry) => (Some(entry.level), entry.message.as_str()),
            LogRecord::Raw(line) => (None, line.as_str()),
        };

        if let Some(min) = self.min_level {
            // Unparsed lines have no level to compare
            if !level.is_some_and(|level| level >= min) {
                return false;
            }
        }

        match &self.grep {
            Some(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }

    fn apply(&self, records: Vec<LogRecord>) -> Vec<LogRecord> {
        let mut selected: Vec<LogRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(tail) = self.tail {
            let skip = selected.len().saturating_sub(tail);
            selected = selected.split_off(skip);
        }
        selected
    }
}

/// Print the event log
///
/// # Arguments
/// * `config` - The CLI configuration
/// * `file` - Log file overriding the configured one
/// * `level` - Minimum level to show
/// * `tail` - Show only the last N records
/// * `grep` - Case-insensitive text filter
pub fn show_logs(
    config: &Config,
    file: Option<PathBuf>,
    level: Option<String>,
    tail: Option<usize>,
    grep: Option<String>,
) -> Result<()> {
    let path = file.unwrap_or_else(|| config.daemon.log_file.clone());
    let min_level = level
        .map(|level| level.parse::<LogLevel>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;

    let filter = LogFilter {
        min_level,
        tail,
        grep,
    };
    let records = filter.apply(parse_log(&content));

    if records.is_empty() {
        println!("{}", "No log entries found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Log {}:", path.display()).bold());
    println!("{}", "─".repeat(80).dimmed());
    for record in &records {
        match record {
            LogRecord::Entry(entry) => print_log_entry(entry),
            LogRecord::Raw(line) => println!("{}", line),
        }
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.as_str();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed(),
        level_colored,
        log.message
    );
}
