//! Scheduler layer for the daemon
//!
//! This layer decides when maintenance runs: once at startup, then daily at
//! the configured local time or immediately on a kick. It owns the schedule
//! state and hands cancellation down to the running pipeline.

pub mod clock;
pub mod daily;

pub use clock::{Clock, SystemClock};
pub use daily::{MaintenanceScheduler, ScheduleHandle, ScheduleSettings, Wake, log_report};
