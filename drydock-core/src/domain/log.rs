//! Log domain types
//!
//! Entries are written to the plain-file event log as one line each:
//! `<rfc3339 timestamp> <LEVEL> <message>`. Extra lines of a multi-line
//! message follow as tab-indented continuation lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A log entry emitted by the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl LogEntry {
    /// Creates an entry stamped with the current time
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// Renders the entry in the log-file format, including the trailing newline
    pub fn to_line(&self) -> String {
        let mut lines = self.message.lines();
        let first = lines.next().unwrap_or("");
        let mut out = format!(
            "{} {:<7} {}\n",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.level.as_str(),
            first
        );
        for line in lines {
            out.push('\t');
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Parses one header line of the log-file format
    ///
    /// Returns `None` for continuation lines and anything not written by
    /// [`LogEntry::to_line`].
    pub fn parse_line(line: &str) -> Option<Self> {
        if line.starts_with('\t') {
            return None;
        }
        let (timestamp, rest) = line.split_once(' ')?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        let rest = rest.trim_start();
        let (level, message) = rest.split_once(' ').unwrap_or((rest, ""));
        let level = level.parse().ok()?;

        Some(Self {
            timestamp,
            level,
            message: message.trim_start().to_string(),
        })
    }
}

/// Parsed content of a log file
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Entry(LogEntry),
    /// A line that is not in the expected format, kept verbatim
    Raw(String),
}

/// Parses a whole log file, folding continuation lines into their entry
pub fn parse_log(content: &str) -> Vec<LogRecord> {
    let mut records: Vec<LogRecord> = Vec::new();

    for line in content.lines() {
        if let Some(continuation) = line.strip_prefix('\t') {
            if let Some(LogRecord::Entry(entry)) = records.last_mut() {
                entry.message.push('\n');
                entry.message.push_str(continuation);
                continue;
            }
        }

        match LogEntry::parse_line(line) {
            Some(entry) => records.push(LogRecord::Entry(entry)),
            None if line.trim().is_empty() => {}
            None => records.push(LogRecord::Raw(line.to_string())),
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(level: LogLevel, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap(),
            level,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_line_format() {
        let line = entry(LogLevel::Info, "Service started.").to_line();
        assert_eq!(line, "2026-03-01T02:00:00.000Z INFO    Service started.\n");
    }

    #[test]
    fn test_parse_line_round_trip() {
        let original = entry(LogLevel::Warning, "WSL shutdown failed, continuing");
        let parsed = LogEntry::parse_line(original.to_line().trim_end()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_multiline_message_uses_continuation_lines() {
        let original = entry(LogLevel::Debug, "Command output:\nline one\nline two");
        let text = original.to_line();
        assert_eq!(text.lines().count(), 3);

        let records = parse_log(&text);
        assert_eq!(records, vec![LogRecord::Entry(original)]);
    }

    #[test]
    fn test_parse_log_keeps_foreign_lines() {
        let text = format!(
            "{}garbage without a timestamp\n\n{}",
            entry(LogLevel::Info, "a").to_line(),
            entry(LogLevel::Error, "b").to_line()
        );
        let records = parse_log(&text);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            LogRecord::Raw("garbage without a timestamp".to_string())
        );
    }

    #[test]
    fn test_level_parsing_and_order() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("ERROR".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Debug < LogLevel::Error);
    }
}
