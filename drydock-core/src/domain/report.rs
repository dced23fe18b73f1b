//! Maintenance run report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The fixed steps of one maintenance run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaintenanceStep {
    EnsureDaemon,
    SnapshotContainers,
    Prune,
    KillProcesses,
    StopKernelService,
    OptimizeDisks,
    RestartKernelService,
    RecoverDaemon,
}

impl MaintenanceStep {
    /// All steps in declaration order
    pub const ALL: [MaintenanceStep; 8] = [
        MaintenanceStep::EnsureDaemon,
        MaintenanceStep::SnapshotContainers,
        MaintenanceStep::Prune,
        MaintenanceStep::KillProcesses,
        MaintenanceStep::StopKernelService,
        MaintenanceStep::OptimizeDisks,
        MaintenanceStep::RestartKernelService,
        MaintenanceStep::RecoverDaemon,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceStep::EnsureDaemon => "ensure-daemon",
            MaintenanceStep::SnapshotContainers => "snapshot-containers",
            MaintenanceStep::Prune => "prune",
            MaintenanceStep::KillProcesses => "kill-processes",
            MaintenanceStep::StopKernelService => "stop-kernel-service",
            MaintenanceStep::OptimizeDisks => "optimize-disks",
            MaintenanceStep::RestartKernelService => "restart-kernel-service",
            MaintenanceStep::RecoverDaemon => "recover-daemon",
        }
    }

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        *self as usize + 1
    }
}

impl fmt::Display for MaintenanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStepOutcome {
    pub step: MaintenanceStep,
    pub name: String,
    pub succeeded: bool,
    pub detail: String,
    /// A fatal outcome halts the run
    pub fatal: bool,
}

impl PipelineStepOutcome {
    pub fn success(step: MaintenanceStep, detail: impl Into<String>) -> Self {
        Self {
            step,
            name: step.name().to_string(),
            succeeded: true,
            detail: detail.into(),
            fatal: false,
        }
    }

    /// A failure that is logged and absorbed
    pub fn warning(step: MaintenanceStep, detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            ..Self::success(step, detail)
        }
    }

    /// A failure that halts the run
    pub fn fatal(step: MaintenanceStep, detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            fatal: true,
            ..Self::success(step, detail)
        }
    }
}

/// Report of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Outcomes of the attempted steps, in pipeline order
    pub steps: Vec<PipelineStepOutcome>,
    /// The run stopped early on a stop request
    pub cancelled: bool,
    pub overall_succeeded: bool,
}

impl MaintenanceRunReport {
    /// Starts a new report stamped with the current time
    pub fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            cancelled: false,
            overall_succeeded: false,
        }
    }

    /// Appends an outcome and returns whether the run may continue
    pub fn record(&mut self, outcome: PipelineStepOutcome) -> bool {
        let fatal = outcome.fatal;
        self.steps.push(outcome);
        !fatal
    }

    /// Seals the report
    ///
    /// The run succeeded when it was not cancelled and every step was
    /// attempted and succeeded.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.overall_succeeded = !self.cancelled
            && self.steps.len() == MaintenanceStep::ALL.len()
            && self.steps.iter().all(|outcome| outcome.succeeded);
    }

    /// The outcome that halted the run, if any
    pub fn fatal_step(&self) -> Option<&PipelineStepOutcome> {
        self.steps.iter().find(|outcome| outcome.fatal)
    }

    pub fn outcome(&self, step: MaintenanceStep) -> Option<&PipelineStepOutcome> {
        self.steps.iter().find(|outcome| outcome.step == step)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// One-line summary for logs and schedule state
    pub fn summary(&self) -> String {
        let status = if self.overall_succeeded {
            "succeeded".to_string()
        } else if self.cancelled {
            "cancelled".to_string()
        } else if let Some(fatal) = self.fatal_step() {
            format!("failed at step {} ({})", fatal.step.number(), fatal.name)
        } else {
            "completed with warnings".to_string()
        };
        let failed = self.steps.iter().filter(|o| !o.succeeded).count();

        format!(
            "Maintenance run {} {}: {}/{} steps attempted, {} failed",
            self.run_id,
            status,
            self.steps.len(),
            MaintenanceStep::ALL.len(),
            failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_numbers() {
        let numbers: Vec<usize> = MaintenanceStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(MaintenanceStep::Prune < MaintenanceStep::StopKernelService);
        assert_eq!(MaintenanceStep::OptimizeDisks.to_string(), "optimize-disks");
    }

    #[test]
    fn test_record_stops_on_fatal() {
        let mut report = MaintenanceRunReport::begin();
        assert!(report.record(PipelineStepOutcome::success(
            MaintenanceStep::EnsureDaemon,
            "up"
        )));
        assert!(report.record(PipelineStepOutcome::warning(
            MaintenanceStep::SnapshotContainers,
            "count unavailable"
        )));
        assert!(!report.record(PipelineStepOutcome::fatal(MaintenanceStep::Prune, "boom")));

        report.finish();
        assert!(!report.overall_succeeded);
        assert_eq!(report.fatal_step().unwrap().step, MaintenanceStep::Prune);
        assert!(report.summary().contains("failed at step 3 (prune)"));
    }

    #[test]
    fn test_full_successful_run() {
        let mut report = MaintenanceRunReport::begin();
        for step in MaintenanceStep::ALL {
            report.record(PipelineStepOutcome::success(step, "ok"));
        }
        report.finish();
        assert!(report.overall_succeeded);
        assert!(report.duration().is_some());
        assert!(report.summary().contains("succeeded"));
    }

    #[test]
    fn test_cancelled_run_is_not_successful() {
        let mut report = MaintenanceRunReport::begin();
        report.record(PipelineStepOutcome::success(MaintenanceStep::EnsureDaemon, "up"));
        report.cancelled = true;
        report.finish();
        assert!(!report.overall_succeeded);
        assert!(report.summary().contains("cancelled"));
    }

    #[test]
    fn test_report_serializes() {
        let mut report = MaintenanceRunReport::begin();
        report.record(PipelineStepOutcome::success(MaintenanceStep::EnsureDaemon, "up"));
        report.finish();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["step"], "EnsureDaemon");
        assert_eq!(json["steps"][0]["name"], "ensure-daemon");
    }
}
