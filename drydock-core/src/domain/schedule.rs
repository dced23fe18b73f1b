//! Schedule state and daily wake-time arithmetic

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::report::MaintenanceRunReport;

/// Lifecycle phase of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    /// Waiting for the next scheduled time, a kick, or a stop signal
    Idle,
    /// A pipeline run is executing
    Running,
    /// Terminal
    Stopped,
}

/// Condensed result of the most recent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
    pub summary: String,
}

impl From<&MaintenanceRunReport> for RunSummary {
    fn from(report: &MaintenanceRunReport) -> Self {
        Self {
            finished_at: report.finished_at.unwrap_or_else(Utc::now),
            succeeded: report.overall_succeeded,
            summary: report.summary(),
        }
    }
}

/// Process-wide scheduler state
///
/// Written only by the scheduler; everyone else gets a read-only view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub phase: SchedulerPhase,
    /// Local wall-clock time of the next scheduled run
    pub next_run_at: Option<NaiveDateTime>,
    pub is_running: bool,
    pub last_run: Option<RunSummary>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            next_run_at: None,
            is_running: false,
            last_run: None,
        }
    }
}

/// Next occurrence of `at` strictly after `now`
///
/// A time-of-day that has already passed today, including one equal to
/// `now`, rolls over to tomorrow.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now >= today {
        today + Duration::days(1)
    } else {
        today
    }
}

/// Parses a `HH:MM` or `HH:MM:SS` time of day
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}
