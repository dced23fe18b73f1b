//! Drydock daemon library
//!
//! Keeps a Docker Desktop / WSL host lean by pruning, compacting the WSL
//! backing disks and restarting what it stopped, on a daily schedule.
//!
//! Architecture:
//! - Configuration: settings from environment variables with defaults
//! - Host: command execution, process and OS service control
//! - Services: Docker lifecycle, disk compaction, the maintenance pipeline
//! - Scheduler: daily wake loop with cooperative cancellation

pub mod config;
pub mod context;
pub mod event_log;
pub mod host;
pub mod scheduler;
pub mod service;
