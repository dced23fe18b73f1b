//! Docker lifecycle
//!
//! Daemon health checks, container counting, pruning and the
//! kill/relaunch recovery used around the destructive maintenance steps.
//! "Daemon down" is an expected, recoverable state: health checks never
//! return errors, they answer `false`.

use drydock_core::domain::command::{CommandResult, CommandSpec};
use drydock_core::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::event_log::EventLog;
use crate::host::{CommandRunner, ServiceController};

const DOCKER: &str = "docker";

/// How a post-maintenance recovery went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Daemon came up on the first try
    Healthy,
    /// Needed the extra kill and relaunch cycle
    Recovered,
    /// Still down after the extra cycle
    Degraded,
}

/// Docker Desktop and daemon settings
#[derive(Debug, Clone)]
pub struct DockerSettings {
    pub desktop_executable: PathBuf,
    pub daemon_process: String,
    pub desktop_process: String,
    pub launch_attempts: u32,
    pub launch_backoff: Duration,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
    pub prune_timeout: Duration,
}

impl From<&Config> for DockerSettings {
    fn from(config: &Config) -> Self {
        Self {
            desktop_executable: config.desktop_executable.clone(),
            daemon_process: config.daemon_process.clone(),
            desktop_process: config.desktop_process(),
            launch_attempts: config.launch_attempts,
            launch_backoff: config.launch_backoff,
            poll_interval: config.daemon_poll_interval,
            command_timeout: config.command_timeout,
            prune_timeout: config.prune_timeout,
        }
    }
}

/// Drives the Docker daemon through health checks, pruning and restarts
pub struct DockerLifecycle {
    runner: Arc<dyn CommandRunner>,
    controller: ServiceController,
    events: Arc<dyn EventLog>,
    settings: DockerSettings,
}

impl DockerLifecycle {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        controller: ServiceController,
        events: Arc<dyn EventLog>,
        settings: DockerSettings,
    ) -> Self {
        Self {
            runner,
            controller,
            events,
            settings,
        }
    }

    /// Asks the daemon for `docker info`
    ///
    /// Any failure means "not running".
    pub async fn check_running(&self) -> bool {
        let command = CommandSpec::new(DOCKER, ["info"]);
        match self.runner.run(&command, self.settings.command_timeout).await {
            Ok(_) => true,
            Err(e) => {
                self.events
                    .warning(&format!("Docker daemon is not running: {}", e));
                false
            }
        }
    }

    /// Number of containers, running and stopped
    ///
    /// Observability only: a failed query counts as zero.
    pub async fn container_count(&self) -> usize {
        let command = CommandSpec::new(DOCKER, ["ps", "-a", "-q"]);
        match self.runner.run(&command, self.settings.command_timeout).await {
            Ok(output) => output.stdout_lines().count(),
            Err(e) => {
                self.events
                    .error(&format!("Failed to get docker container count: {}", e));
                0
            }
        }
    }

    /// Removes unused containers, networks, all unused images and volumes
    ///
    /// Errors propagate: a failed prune is fatal to the run.
    pub async fn prune(&self) -> Result<CommandResult> {
        let command = CommandSpec::new(
            DOCKER,
            ["system", "prune", "--all", "--volumes", "--force"],
        );
        let result = self.runner.run(&command, self.settings.prune_timeout).await?;
        self.events
            .info(&format!("Docker prune output: {}", result.stdout.trim()));
        Ok(result)
    }

    /// Kills the daemon and desktop processes independently
    pub async fn kill_all(&self) {
        for name in [&self.settings.daemon_process, &self.settings.desktop_process] {
            self.controller.kill_process(name).await;
        }
    }

    /// Makes sure the daemon answers, relaunching Docker Desktop if needed
    ///
    /// Never launches when the daemon is already up. After a verified launch
    /// the daemon is polled until `max_wait` elapses.
    pub async fn ensure_running(&self, max_wait: Duration) -> bool {
        if self.check_running().await {
            return true;
        }

        self.events
            .warning("Docker is not running; attempting to start Docker Desktop.");

        let launched = self
            .controller
            .launch_and_verify(
                &self.settings.desktop_executable,
                self.settings.launch_attempts,
                self.settings.launch_backoff,
            )
            .await;

        if !launched {
            return self.check_running().await;
        }

        self.events.info(&format!(
            "Waiting up to {:?} for Docker to start...",
            max_wait
        ));
        let deadline = Instant::now() + max_wait;

        loop {
            if self.check_running().await {
                self.events.info("Docker is now running.");
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                self.events
                    .error("Docker still isn't running after attempting to start it.");
                return false;
            }

            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }

    /// Brings the daemon back after maintenance
    ///
    /// One extra kill and relaunch cycle is tried before giving up.
    pub async fn recover(&self, max_wait: Duration) -> RecoveryOutcome {
        if self.ensure_running(max_wait).await {
            return RecoveryOutcome::Healthy;
        }

        self.events
            .warning("Docker did not come back; killing and relaunching once more.");
        self.kill_all().await;

        if self.ensure_running(max_wait).await {
            RecoveryOutcome::Recovered
        } else {
            self.events
                .error("Docker is still down after the extra relaunch; run is degraded.");
            RecoveryOutcome::Degraded
        }
    }
}

/// Extracts the "Total reclaimed space" figure from prune output
pub fn reclaimed_space(output: &CommandResult) -> Option<&str> {
    output
        .stdout_lines()
        .find_map(|line| line.strip_prefix("Total reclaimed space:"))
        .map(str::trim)
}
