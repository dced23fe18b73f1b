//! Maintenance context
//!
//! Wires the shared pieces every entry point needs:
//! - Validated configuration
//! - The event log (tracing plus the plain log file)
//! - The command runner and host platform
//!
//! Both the daemon and the one-shot CLI build their pipeline from here.

use std::sync::Arc;

use crate::config::Config;
use crate::event_log::{EventLog, FanoutEventLog, FileEventLog, TracingEventLog, write_startup_marker};
use crate::host::{CommandRunner, Platform, SystemCommandRunner};
use crate::scheduler::{MaintenanceScheduler, ScheduleSettings, SystemClock};
use crate::service::{MaintenancePipeline, MaintenanceTask};

/// Shared state for building and running maintenance
pub struct MaintenanceContext {
    pub config: Config,
    pub events: Arc<dyn EventLog>,
    pub runner: Arc<dyn CommandRunner>,
    pub platform: Platform,
}

impl MaintenanceContext {
    /// Creates a context backed by real processes on the current platform
    ///
    /// Events go to tracing and to `config.log_file`, which is cleared first
    /// when `config.truncate_log_on_start` is set.
    pub fn new(config: Config) -> Self {
        let file = FileEventLog::open(config.log_file.clone(), config.truncate_log_on_start);
        let events: Arc<dyn EventLog> = Arc::new(
            FanoutEventLog::new()
                .with(Arc::new(TracingEventLog))
                .with(Arc::new(file)),
        );
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new(events.clone()));

        Self::with_parts(config, events, runner, Platform::current())
    }

    pub fn with_parts(
        config: Config,
        events: Arc<dyn EventLog>,
        runner: Arc<dyn CommandRunner>,
        platform: Platform,
    ) -> Self {
        Self {
            config,
            events,
            runner,
            platform,
        }
    }

    /// Records the daemon start next to the log file
    pub fn write_startup_marker(&self) {
        write_startup_marker(&self.config.startup_marker());
    }

    pub fn pipeline(&self) -> MaintenancePipeline {
        MaintenancePipeline::from_config(
            &self.config,
            self.runner.clone(),
            self.events.clone(),
            self.platform,
        )
    }

    /// Daily scheduler driving this context's pipeline on the local clock
    pub fn scheduler(&self) -> MaintenanceScheduler {
        let task: Arc<dyn MaintenanceTask> = Arc::new(self.pipeline());
        MaintenanceScheduler::new(
            task,
            Arc::new(SystemClock),
            self.events.clone(),
            ScheduleSettings::from(&self.config),
        )
    }
}
