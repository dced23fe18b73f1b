//! Maintenance pipeline
//!
//! Runs the eight maintenance steps in a fixed order and records one outcome
//! per attempted step. The order is a safety contract:
//!
//! 1. ensure the Docker daemon is up
//! 2. snapshot the container count
//! 3. prune (fatal on failure)
//! 4. kill the daemon and desktop processes
//! 5. shut down WSL and stop the kernel-integration service
//! 6. compact the backing files
//! 7. restart the kernel-integration service
//! 8. recover the Docker daemon
//!
//! Compaction never starts before the service is stopped and the daemon has
//! been taken down. A fatal outcome ends the run. Stop requests are honored
//! between steps up to the process kill; once the daemon is down the run
//! carries on so the host is never left with its services stopped.

use async_trait::async_trait;
use drydock_core::domain::command::CommandSpec;
use drydock_core::domain::report::{MaintenanceRunReport, MaintenanceStep, PipelineStepOutcome};
use drydock_core::domain::service::ServiceStatus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::event_log::EventLog;
use crate::host::{CommandRunner, Platform, ServiceController};
use crate::service::docker::{DockerLifecycle, DockerSettings, RecoveryOutcome, reclaimed_space};
use crate::service::vhd::VhdOptimizer;

/// Last step a stop request may skip; later steps restore the host
const LAST_INTERRUPTIBLE: MaintenanceStep = MaintenanceStep::KillProcesses;

/// One complete maintenance run
///
/// The scheduler only knows this seam, so tests can swap in a fake task.
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
    /// Executes a run, checking `cancel` between steps
    async fn run(&self, cancel: &CancellationToken) -> MaintenanceRunReport;
}

/// Pipeline-level settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub kernel_service: String,
    pub user_profile: PathBuf,
    pub convergence_timeout: Duration,
    pub daemon_start_timeout: Duration,
    pub command_timeout: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            kernel_service: config.kernel_service.clone(),
            user_profile: config.user_profile.clone(),
            convergence_timeout: config.service_convergence_timeout,
            daemon_start_timeout: config.daemon_start_timeout,
            command_timeout: config.command_timeout,
        }
    }
}

/// Values carried from one step to a later one
#[derive(Debug, Default)]
struct RunState {
    containers_before: usize,
}

/// The standard eight-step maintenance pipeline
pub struct MaintenancePipeline {
    runner: Arc<dyn CommandRunner>,
    controller: ServiceController,
    docker: DockerLifecycle,
    vhd: VhdOptimizer,
    events: Arc<dyn EventLog>,
    settings: PipelineSettings,
}

impl MaintenancePipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        controller: ServiceController,
        docker: DockerLifecycle,
        vhd: VhdOptimizer,
        events: Arc<dyn EventLog>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            runner,
            controller,
            docker,
            vhd,
            events,
            settings,
        }
    }

    /// Wires the pipeline and its components from configuration
    pub fn from_config(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        events: Arc<dyn EventLog>,
        platform: Platform,
    ) -> Self {
        let controller = ServiceController::new(
            runner.clone(),
            events.clone(),
            platform,
            config.command_timeout,
        );
        let docker = DockerLifecycle::new(
            runner.clone(),
            controller.clone(),
            events.clone(),
            DockerSettings::from(config),
        );
        let vhd = VhdOptimizer::new(runner.clone(), events.clone(), config.compaction_timeout)
            .with_extra_paths(config.vhd_search_paths.clone());

        Self::new(
            runner,
            controller,
            docker,
            vhd,
            events,
            PipelineSettings::from(config),
        )
    }

    async fn execute_step(&self, step: MaintenanceStep, state: &mut RunState) -> PipelineStepOutcome {
        match step {
            MaintenanceStep::EnsureDaemon => self.ensure_daemon().await,
            MaintenanceStep::SnapshotContainers => self.snapshot_containers(state).await,
            MaintenanceStep::Prune => self.prune(state).await,
            MaintenanceStep::KillProcesses => self.kill_processes().await,
            MaintenanceStep::StopKernelService => self.stop_kernel_service().await,
            MaintenanceStep::OptimizeDisks => self.optimize_disks().await,
            MaintenanceStep::RestartKernelService => self.restart_kernel_service().await,
            MaintenanceStep::RecoverDaemon => self.recover_daemon().await,
        }
    }

    async fn ensure_daemon(&self) -> PipelineStepOutcome {
        let step = MaintenanceStep::EnsureDaemon;
        if self
            .docker
            .ensure_running(self.settings.daemon_start_timeout)
            .await
        {
            PipelineStepOutcome::success(step, "Docker daemon is running")
        } else {
            PipelineStepOutcome::fatal(step, "Docker daemon is not running and could not be started")
        }
    }

    async fn snapshot_containers(&self, state: &mut RunState) -> PipelineStepOutcome {
        state.containers_before = self.docker.container_count().await;
        PipelineStepOutcome::success(
            MaintenanceStep::SnapshotContainers,
            format!("{} containers before prune", state.containers_before),
        )
    }

    async fn prune(&self, state: &RunState) -> PipelineStepOutcome {
        let step = MaintenanceStep::Prune;
        match self.docker.prune().await {
            Ok(output) => {
                let after = self.docker.container_count().await;
                let removed = state.containers_before.saturating_sub(after);
                let reclaimed = reclaimed_space(&output).unwrap_or("unknown");
                PipelineStepOutcome::success(
                    step,
                    format!(
                        "Removed {} containers ({} remain), reclaimed {}",
                        removed, after, reclaimed
                    ),
                )
            }
            Err(e) => PipelineStepOutcome::fatal(step, format!("Docker prune failed: {}", e)),
        }
    }

    async fn kill_processes(&self) -> PipelineStepOutcome {
        self.docker.kill_all().await;
        PipelineStepOutcome::success(
            MaintenanceStep::KillProcesses,
            "Docker daemon and desktop processes terminated",
        )
    }

    async fn stop_kernel_service(&self) -> PipelineStepOutcome {
        let step = MaintenanceStep::StopKernelService;
        let service = &self.settings.kernel_service;

        if self.controller.platform() == Platform::Windows {
            let shutdown = CommandSpec::new("wsl", ["--shutdown"]);
            match self.runner.run(&shutdown, self.settings.command_timeout).await {
                Ok(_) => self.events.info("WSL shut down"),
                Err(e) => self
                    .events
                    .warning(&format!("WSL shutdown failed, continuing: {}", e)),
            }
        }

        if let Err(e) = self.controller.stop_service(service).await {
            return PipelineStepOutcome::fatal(
                step,
                format!("Failed to stop service {}: {}", service, e),
            );
        }

        if self
            .controller
            .wait_for_service_status(service, ServiceStatus::Stopped, self.settings.convergence_timeout)
            .await
        {
            PipelineStepOutcome::success(step, format!("Service {} stopped", service))
        } else {
            PipelineStepOutcome::warning(
                step,
                format!(
                    "Service {} was not confirmed stopped within {:?}",
                    service, self.settings.convergence_timeout
                ),
            )
        }
    }

    async fn optimize_disks(&self) -> PipelineStepOutcome {
        let step = MaintenanceStep::OptimizeDisks;
        let files = self.vhd.locate_backing_files(&self.settings.user_profile);

        if files.is_empty() {
            self.events.warning(&format!(
                "No Docker VHD files found under {}",
                self.settings.user_profile.display()
            ));
            return PipelineStepOutcome::success(step, "No backing files found");
        }

        let mut failed = Vec::new();
        for path in &files {
            if let Err(e) = self.vhd.optimize(path).await {
                self.events
                    .error(&format!("Failed to optimize {}: {}", path.display(), e));
                failed.push(path.display().to_string());
            }
        }

        if failed.is_empty() {
            PipelineStepOutcome::success(step, format!("Optimized {} backing file(s)", files.len()))
        } else {
            PipelineStepOutcome::warning(
                step,
                format!(
                    "Optimized {}/{} backing file(s); failed: {}",
                    files.len() - failed.len(),
                    files.len(),
                    failed.join(", ")
                ),
            )
        }
    }

    async fn restart_kernel_service(&self) -> PipelineStepOutcome {
        let step = MaintenanceStep::RestartKernelService;
        let service = &self.settings.kernel_service;

        if let Err(e) = self.controller.start_service(service).await {
            self.events
                .error(&format!("Failed to start service {}: {}", service, e));
            return PipelineStepOutcome::warning(
                step,
                format!("Failed to start service {}: {}", service, e),
            );
        }

        if self
            .controller
            .wait_for_service_status(service, ServiceStatus::Running, self.settings.convergence_timeout)
            .await
        {
            let mut detail = format!("Service {} running", service);
            if self.controller.platform() == Platform::Windows {
                detail.push_str("; ");
                detail.push_str(&self.check_wsl().await);
            }
            PipelineStepOutcome::success(step, detail)
        } else {
            PipelineStepOutcome::warning(
                step,
                format!(
                    "Service {} did not reach running within {:?}",
                    service, self.settings.convergence_timeout
                ),
            )
        }
    }

    /// Lists distributions to confirm WSL answers again; never fails the step
    async fn check_wsl(&self) -> String {
        let list = CommandSpec::new("wsl", ["-l"]);
        match self.runner.run(&list, self.settings.command_timeout).await {
            Ok(result) => {
                // wsl.exe writes UTF-16, which leaves NULs after a lossy decode
                let listing: String = result.stdout.chars().filter(|c| *c != '\0').collect();
                self.events
                    .info(&format!("WSL operational check passed: {}", listing.trim()));
                "WSL responding".to_string()
            }
            Err(e) => {
                self.events
                    .warning(&format!("WSL operational check failed: {}", e));
                "WSL check failed".to_string()
            }
        }
    }

    async fn recover_daemon(&self) -> PipelineStepOutcome {
        let step = MaintenanceStep::RecoverDaemon;
        match self.docker.recover(self.settings.daemon_start_timeout).await {
            RecoveryOutcome::Healthy => PipelineStepOutcome::success(step, "Docker daemon is running"),
            RecoveryOutcome::Recovered => PipelineStepOutcome::success(
                step,
                "Docker daemon running after an extra kill and relaunch",
            ),
            RecoveryOutcome::Degraded => {
                PipelineStepOutcome::warning(step, "Docker daemon did not come back")
            }
        }
    }

    fn log_outcome(&self, outcome: &PipelineStepOutcome) {
        let message = format!(
            "Step {}/{} {}: {}",
            outcome.step.number(),
            MaintenanceStep::ALL.len(),
            outcome.name,
            outcome.detail
        );
        if outcome.fatal {
            self.events.error(&message);
        } else if outcome.succeeded {
            self.events.info(&message);
        } else {
            self.events.warning(&message);
        }
    }
}

#[async_trait]
impl MaintenanceTask for MaintenancePipeline {
    async fn run(&self, cancel: &CancellationToken) -> MaintenanceRunReport {
        let mut report = MaintenanceRunReport::begin();
        let mut state = RunState::default();
        self.events
            .info(&format!("Starting maintenance run {}", report.run_id));

        for step in MaintenanceStep::ALL {
            if cancel.is_cancelled() {
                if step <= LAST_INTERRUPTIBLE {
                    self.events.warning(&format!(
                        "Stop requested; skipping remaining steps from {}",
                        step
                    ));
                    report.cancelled = true;
                    break;
                }
                self.events.info(&format!(
                    "Stop requested; finishing {} before shutting down",
                    step
                ));
            }

            self.events.info(&format!(
                "Step {}/{}: {}",
                step.number(),
                MaintenanceStep::ALL.len(),
                step
            ));
            let outcome = self.execute_step(step, &mut state).await;
            self.log_outcome(&outcome);

            if !report.record(outcome) {
                self.events
                    .error(&format!("Step {} is fatal; halting maintenance run", step));
                break;
            }
        }

        report.finish();
        report
    }
}
