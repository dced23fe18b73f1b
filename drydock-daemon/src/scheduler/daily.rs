//! Daily maintenance scheduler
//!
//! Waits for the configured time of day (or a kick), runs the maintenance
//! task to completion and goes back to waiting. Only one run is ever in
//! flight. The schedule state is published through a `watch` channel whose
//! only sender lives here.

use chrono::{NaiveTime, Utc};
use drydock_core::domain::report::MaintenanceRunReport;
use drydock_core::domain::schedule::{
    RunSummary, ScheduleState, SchedulerPhase, next_run_after,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::event_log::EventLog;
use crate::scheduler::clock::Clock;
use crate::service::MaintenanceTask;

/// Longest single sleep; the wall clock is re-read after each one so clock
/// changes and suspend/resume are picked up
const MAX_WAIT_SLICE: Duration = Duration::from_secs(60);

/// Why the scheduler stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Scheduled,
    Kicked,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub maintenance_time: NaiveTime,
    pub run_on_start: bool,
}

impl From<&Config> for ScheduleSettings {
    fn from(config: &Config) -> Self {
        Self {
            maintenance_time: config.maintenance_time,
            run_on_start: config.run_on_start,
        }
    }
}

/// Read-only view of the scheduler plus the kick
#[derive(Clone)]
pub struct ScheduleHandle {
    state: watch::Receiver<ScheduleState>,
    kick: Arc<Notify>,
}

impl ScheduleHandle {
    pub fn state(&self) -> ScheduleState {
        self.state.borrow().clone()
    }

    /// Requests a run as soon as the scheduler is idle
    pub fn trigger_now(&self) {
        self.kick.notify_one();
    }
}

pub struct MaintenanceScheduler {
    task: Arc<dyn MaintenanceTask>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    settings: ScheduleSettings,
    state: watch::Sender<ScheduleState>,
    kick: Arc<Notify>,
}

impl MaintenanceScheduler {
    pub fn new(
        task: Arc<dyn MaintenanceTask>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
        settings: ScheduleSettings,
    ) -> Self {
        let (state, _) = watch::channel(ScheduleState::default());
        Self {
            task,
            clock,
            events,
            settings,
            state,
            kick: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            state: self.state.subscribe(),
            kick: self.kick.clone(),
        }
    }

    /// Runs until `cancel` fires
    ///
    /// A stop while waiting exits without starting a run. A stop during a run
    /// lets that run finish and prevents the next one.
    ///
    /// # Returns
    /// The final (stopped) schedule state
    pub async fn run(self, cancel: CancellationToken) -> ScheduleState {
        self.events.info(&format!(
            "Maintenance scheduler started; daily run at {}",
            self.settings.maintenance_time.format("%H:%M")
        ));

        if self.settings.run_on_start && !cancel.is_cancelled() {
            self.events.info("Running initial maintenance on startup");
            self.run_once(&cancel).await;
        }

        while !cancel.is_cancelled() {
            let next = next_run_after(self.clock.now(), self.settings.maintenance_time);
            self.state.send_modify(|state| {
                state.phase = SchedulerPhase::Idle;
                state.next_run_at = Some(next);
            });
            self.events
                .info(&format!("Next maintenance run scheduled for {}", next));

            match self.wait_until(next, &cancel).await {
                Wake::Stopped => break,
                Wake::Scheduled => self.events.info("Scheduled maintenance time reached"),
                Wake::Kicked => self.events.info("Immediate maintenance run requested"),
            }

            self.run_once(&cancel).await;
        }

        self.state.send_modify(|state| {
            state.phase = SchedulerPhase::Stopped;
            state.next_run_at = None;
            state.is_running = false;
        });
        self.events.info("Maintenance scheduler stopped");
        let final_state = self.state.borrow().clone();
        final_state
    }

    async fn wait_until(&self, next: chrono::NaiveDateTime, cancel: &CancellationToken) -> Wake {
        loop {
            let now = self.clock.now();
            if now >= next {
                return Wake::Scheduled;
            }
            let remaining = (next - now).to_std().unwrap_or_default().min(MAX_WAIT_SLICE);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Wake::Stopped,
                _ = self.kick.notified() => return Wake::Kicked,
                _ = tokio::time::sleep(remaining) => {}
            }
        }
    }

    async fn run_once(&self, cancel: &CancellationToken) {
        self.state.send_modify(|state| {
            state.phase = SchedulerPhase::Running;
            state.is_running = true;
        });

        let task = self.task.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { task.run(&token).await });

        let summary = match handle.await {
            Ok(report) => {
                log_report(self.events.as_ref(), &report);
                RunSummary::from(&report)
            }
            Err(e) => {
                self.events
                    .error(&format!("Maintenance run aborted unexpectedly: {}", e));
                RunSummary {
                    finished_at: Utc::now(),
                    succeeded: false,
                    summary: format!("Maintenance run aborted: {}", e),
                }
            }
        };

        self.state.send_modify(|state| {
            state.phase = SchedulerPhase::Idle;
            state.is_running = false;
            state.last_run = Some(summary);
        });
    }
}

/// Writes a finished report to the event log, one line per step
pub fn log_report(events: &dyn EventLog, report: &MaintenanceRunReport) {
    for outcome in &report.steps {
        let status = match (outcome.succeeded, outcome.fatal) {
            (true, _) => "ok",
            (false, true) => "FATAL",
            (false, false) => "warn",
        };
        events.info(&format!(
            "  [{}] {} {}: {}",
            status,
            outcome.step.number(),
            outcome.name,
            outcome.detail
        ));
    }

    if report.overall_succeeded {
        events.info(&report.summary());
    } else {
        events.warning(&report.summary());
    }
}
