//! Process and OS service control
//!
//! Start, stop and poll named services and named executables. State changes
//! are asynchronous at the OS level, so callers that depend on a service
//! actually being down (or up) use [`ServiceController::wait_for_service_status`].

use drydock_core::HostError;
use drydock_core::domain::command::CommandSpec;
use drydock_core::domain::service::ServiceStatus;
use drydock_core::error::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::event_log::EventLog;
use crate::host::runner::CommandRunner;

/// Image name of an executable as the process list shows it
///
/// Splits on both separators so Windows paths work on any host.
pub fn process_name(executable: &Path) -> String {
    let path = executable.to_string_lossy();
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Command vocabulary of the host OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// tasklist / taskkill / sc.exe
    Windows,
    /// pgrep / pkill / systemctl
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    fn list_process(&self, name: &str) -> CommandSpec {
        match self {
            Platform::Windows => CommandSpec::new(
                "tasklist",
                [
                    "/FI".to_string(),
                    format!("IMAGENAME eq {}", name),
                    "/FO".to_string(),
                    "CSV".to_string(),
                    "/NH".to_string(),
                ],
            ),
            Platform::Unix => CommandSpec::new("pgrep", ["-x", name]),
        }
    }

    fn kill_process(&self, name: &str) -> CommandSpec {
        match self {
            Platform::Windows => CommandSpec::new("taskkill", ["/F", "/IM", name]),
            Platform::Unix => CommandSpec::new("pkill", ["-x", name]),
        }
    }

    fn service(&self, verb: &str, name: &str) -> CommandSpec {
        match self {
            Platform::Windows => CommandSpec::new("sc", [verb, name]),
            Platform::Unix => {
                let verb = if verb == "query" { "is-active" } else { verb };
                CommandSpec::new("systemctl", [verb, name])
            }
        }
    }

    /// Exit code meaning "no such process" for the kill command
    fn kill_not_found_code(&self) -> i32 {
        match self {
            Platform::Windows => 128,
            Platform::Unix => 1,
        }
    }
}

/// Controls named processes and OS services through a CommandRunner
#[derive(Clone)]
pub struct ServiceController {
    runner: Arc<dyn CommandRunner>,
    events: Arc<dyn EventLog>,
    platform: Platform,
    command_timeout: Duration,
    poll_interval: Duration,
}

impl ServiceController {
    /// Creates a controller polling service status every second
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        events: Arc<dyn EventLog>,
        platform: Platform,
        command_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            events,
            platform,
            command_timeout,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Checks the OS process list for `name`
    ///
    /// Absence is `Ok(false)`; only a failure to query the OS is an error.
    pub async fn is_process_running(&self, name: &str) -> Result<bool> {
        let command = self.platform.list_process(name);

        match (self.platform, self.runner.run(&command, self.command_timeout).await) {
            // CSV rows keep the full image name; the table form cuts it at 25
            (Platform::Windows, Ok(output)) => Ok(output.stdout_lines().any(|line| {
                line.split(',')
                    .next()
                    .map(|field| field.trim().trim_matches('"'))
                    .is_some_and(|image| image.eq_ignore_ascii_case(name))
            })),
            (Platform::Unix, Ok(output)) => Ok(output.stdout_lines().next().is_some()),
            // pgrep exits 1 when nothing matched
            (Platform::Unix, Err(HostError::CommandFailed { exit_code: 1, .. })) => Ok(false),
            (_, Err(e)) => Err(e),
        }
    }

    /// Kills every process named `name`
    ///
    /// Best effort: a missing process is fine and failures are only logged.
    pub async fn kill_process(&self, name: &str) {
        self.events
            .debug(&format!("Killing processes named: {}", name));
        let command = self.platform.kill_process(name);

        match self.runner.run(&command, self.command_timeout).await {
            Ok(output) => {
                self.events.info(&format!(
                    "Killed {} processes if any. Output: {}",
                    name,
                    output.stdout.trim()
                ));
            }
            Err(HostError::CommandFailed { exit_code, .. })
                if exit_code == self.platform.kill_not_found_code() =>
            {
                self.events
                    .debug(&format!("No running process named {}", name));
            }
            Err(e) => {
                self.events
                    .warning(&format!("Failed to kill process {}: {}", name, e));
            }
        }
    }

    /// Queries the current status of a service
    pub async fn query_service(&self, name: &str) -> Result<ServiceStatus> {
        let command = self.platform.service("query", name);

        match (self.platform, self.runner.run(&command, self.command_timeout).await) {
            (Platform::Windows, Ok(output)) => Ok(ServiceStatus::from_sc_query(&output.stdout)),
            (Platform::Unix, Ok(output)) => Ok(ServiceStatus::from_systemctl(&output.stdout)),
            // is-active reports inactive units with a non-zero exit code
            (Platform::Unix, Err(HostError::CommandFailed { stdout, .. }))
                if !stdout.trim().is_empty() =>
            {
                Ok(ServiceStatus::from_systemctl(&stdout))
            }
            (_, Err(e)) => Err(e),
        }
    }

    /// Requests a service start without waiting for it to converge
    ///
    /// A service that is already running or starting is left alone.
    pub async fn start_service(&self, name: &str) -> Result<()> {
        match self.query_service(name).await {
            Ok(status @ (ServiceStatus::Running | ServiceStatus::StartPending)) => {
                self.events.info(&format!(
                    "Service {} already {}; not starting",
                    name, status
                ));
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => self
                .events
                .debug(&format!("Could not query service {}: {}", name, e)),
        }

        self.events.info(&format!("Starting service {}", name));
        self.runner
            .run(&self.platform.service("start", name), self.command_timeout)
            .await
            .map(|_| ())
    }

    /// Requests a service stop without waiting for it to converge
    ///
    /// A service that is already stopped or stopping is left alone.
    pub async fn stop_service(&self, name: &str) -> Result<()> {
        match self.query_service(name).await {
            Ok(status @ (ServiceStatus::Stopped | ServiceStatus::StopPending)) => {
                self.events.info(&format!(
                    "Service {} already {}; not stopping",
                    name, status
                ));
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => self
                .events
                .debug(&format!("Could not query service {}: {}", name, e)),
        }

        self.events.info(&format!("Stopping service {}", name));
        self.runner
            .run(&self.platform.service("stop", name), self.command_timeout)
            .await
            .map(|_| ())
    }

    /// Polls until the service reports `target` or `timeout` elapses
    ///
    /// Query failures while polling count as "not there yet".
    ///
    /// # Returns
    /// `true` if the target status was observed
    pub async fn wait_for_service_status(
        &self,
        name: &str,
        target: ServiceStatus,
        timeout: Duration,
    ) -> bool {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            match self.query_service(name).await {
                Ok(status) if status == target => {
                    self.events.info(&format!(
                        "Service {} reached {} after {:?}",
                        name,
                        target,
                        started.elapsed()
                    ));
                    return true;
                }
                Ok(status) => self
                    .events
                    .debug(&format!("Service {} is {}, waiting for {}", name, status, target)),
                Err(e) => self
                    .events
                    .debug(&format!("Service {} status unavailable: {}", name, e)),
            }

            let now = Instant::now();
            if now >= deadline {
                let err = HostError::ConvergenceTimeout {
                    service: name.to_string(),
                    target,
                    waited: timeout,
                };
                self.events.warning(&err.to_string());
                return false;
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Launches an executable and verifies that its process shows up
    ///
    /// Each attempt launches, waits the current backoff and checks the process
    /// list for the executable's file name. The backoff doubles after every
    /// failed attempt. A missing executable fails immediately.
    ///
    /// # Returns
    /// `false` only after all attempts are exhausted, or if the path is missing
    pub async fn launch_and_verify(
        &self,
        executable: &Path,
        max_attempts: u32,
        initial_backoff: Duration,
    ) -> bool {
        if !executable.exists() {
            let err = HostError::ResourceNotFound(executable.display().to_string());
            self.events
                .error(&format!("Executable not found, not launching: {}", err));
            return false;
        }

        let process_name = process_name(executable);
        let mut backoff = initial_backoff;

        for attempt in 1..=max_attempts {
            self.events.info(&format!(
                "Launching {} (attempt {}/{})",
                executable.display(),
                attempt,
                max_attempts
            ));

            if let Err(e) = self.runner.launch(executable).await {
                self.events.error(&format!(
                    "Failed to launch {} on attempt {}: {}",
                    process_name, attempt, e
                ));
            }

            tokio::time::sleep(backoff).await;

            match self.is_process_running(&process_name).await {
                Ok(true) => {
                    self.events.info(&format!(
                        "{} is running (attempt {})",
                        process_name, attempt
                    ));
                    return true;
                }
                Ok(false) => self.events.warning(&format!(
                    "{} does not appear to be running (attempt {})",
                    process_name, attempt
                )),
                Err(e) => self.events.warning(&format!(
                    "Could not check whether {} is running (attempt {}): {}",
                    process_name, attempt, e
                )),
            }

            backoff = backoff.saturating_mul(2);
        }

        self.events.error(&format!(
            "Failed to start {} after {} attempts",
            process_name, max_attempts
        ));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::MemoryEventLog;
    use crate::host::testing::{ScriptedRunner, command_failed};
    use drydock_core::domain::log::LogLevel;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn controller(runner: &Arc<ScriptedRunner>, platform: Platform) -> (ServiceController, MemoryEventLog) {
        let events = MemoryEventLog::new();
        let controller = ServiceController::new(
            runner.clone(),
            Arc::new(events.clone()),
            platform,
            Duration::from_secs(30),
        );
        (controller, events)
    }

    #[test]
    fn test_process_name_handles_both_separators() {
        assert_eq!(
            process_name(Path::new(r"C:\Program Files\Docker\Docker\Docker Desktop.exe")),
            "Docker Desktop.exe"
        );
        assert_eq!(process_name(Path::new("/usr/bin/dockerd")), "dockerd");
    }

    #[tokio::test]
    async fn test_windows_process_check() {
        let runner = ScriptedRunner::new();
        runner.ok(
            "tasklist",
            "\"Docker Desktop.exe\",\"4242\",\"Console\",\"1\",\"210,000 K\"\n",
        );
        let (controller, _) = controller(&runner, Platform::Windows);

        assert!(controller.is_process_running("Docker Desktop.exe").await.unwrap());
        assert_eq!(
            runner.calls(),
            vec!["tasklist /FI \"IMAGENAME eq Docker Desktop.exe\" /FO CSV /NH"]
        );

        runner.ok(
            "tasklist",
            "INFO: No tasks are running which match the specified criteria.\n",
        );
        assert!(!controller.is_process_running("Docker Desktop.exe").await.unwrap());
    }

    #[tokio::test]
    async fn test_windows_process_check_long_image_name() {
        let runner = ScriptedRunner::new();
        let name = "com.docker.build.extension.helper.exe";
        runner.ok(
            "tasklist",
            &format!("\"{}\",\"5150\",\"Console\",\"1\",\"12,000 K\"\n", name),
        );
        let (controller, _) = controller(&runner, Platform::Windows);

        assert!(controller.is_process_running(name).await.unwrap());
        assert!(
            !controller
                .is_process_running("com.docker.build.exe")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_unix_process_check_not_found_is_false() {
        let runner = ScriptedRunner::new();
        runner.fail("pgrep -x dockerd", 1, "");
        let (controller, _) = controller(&runner, Platform::Unix);
        assert!(!controller.is_process_running("dockerd").await.unwrap());

        runner.fail("pgrep -x dockerd", 2, "syntax error");
        assert!(controller.is_process_running("dockerd").await.is_err());
    }

    #[tokio::test]
    async fn test_kill_missing_process_is_not_an_error() {
        let runner = ScriptedRunner::new();
        runner.fail("taskkill", 128, "ERROR: The process \"docker.exe\" not found.");
        let (controller, events) = controller(&runner, Platform::Windows);

        controller.kill_process("docker.exe").await;
        assert!(events.contains(LogLevel::Debug, "No running process named docker.exe"));
        assert!(!events.contains(LogLevel::Warning, "docker.exe"));
    }

    #[tokio::test]
    async fn test_stop_already_stopped_service_is_noop() {
        let runner = ScriptedRunner::new();
        runner.ok("sc query", "        STATE              : 1  STOPPED\n");
        let (controller, _) = controller(&runner, Platform::Windows);

        controller.stop_service("WSLService").await.unwrap();
        assert_eq!(runner.count("sc stop"), 0);
    }

    #[tokio::test]
    async fn test_stop_running_service_issues_stop() {
        let runner = ScriptedRunner::new();
        runner.ok("sc query", "        STATE              : 4  RUNNING\n");
        runner.fail("sc stop", 5, "Access is denied.");
        let (controller, _) = controller(&runner, Platform::Windows);

        let err = controller.stop_service("WSLService").await.unwrap_err();
        assert_eq!(err.exit_code(), Some(5));
        assert_eq!(runner.count("sc stop WSLService"), 1);
    }

    #[tokio::test]
    async fn test_systemctl_inactive_is_stopped() {
        let runner = ScriptedRunner::new();
        runner.on("systemctl is-active", |command| {
            Err(command_failed(command, 3, "inactive\n", ""))
        });
        let (controller, _) = controller(&runner, Platform::Unix);
        assert_eq!(
            controller.query_service("docker").await.unwrap(),
            ServiceStatus::Stopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_status_returns_early_on_convergence() {
        let runner = ScriptedRunner::new();
        let started = Instant::now();
        runner.on_output("sc query", move |_| {
            if started.elapsed() >= Duration::from_secs(10) {
                "STATE : 4  RUNNING".to_string()
            } else {
                "STATE : 2  START_PENDING".to_string()
            }
        });
        let (controller, _) = controller(&runner, Platform::Windows);

        let converged = controller
            .wait_for_service_status("WSLService", ServiceStatus::Running, Duration::from_secs(60))
            .await;

        assert!(converged);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10));
        assert!(waited < Duration::from_secs(12));
        assert_eq!(runner.count("sc query"), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_status_times_out() {
        let runner = ScriptedRunner::new();
        runner.ok("sc query", "STATE : 3  STOP_PENDING");
        let (controller, events) = controller(&runner, Platform::Windows);
        let started = Instant::now();

        let converged = controller
            .wait_for_service_status("WSLService", ServiceStatus::Stopped, Duration::from_secs(5))
            .await;

        assert!(!converged);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(events.contains(LogLevel::Warning, "did not reach stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_and_verify_backs_off_exponentially() {
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_string_lossy().into_owned();
        let runner = ScriptedRunner::new();
        runner.ok("tasklist", "INFO: No tasks are running");
        let (controller, _) = controller(&runner, Platform::Windows);
        let started = Instant::now();

        let launched = controller
            .launch_and_verify(&exe, 3, Duration::from_secs(5))
            .await;

        assert!(!launched);
        assert_eq!(runner.launches().len(), 3);
        let checks = runner.call_times(&format!("tasklist /FI \"IMAGENAME eq {}\"", name));
        let offsets: Vec<Duration> = checks.iter().map(|t| *t - started).collect();
        assert_eq!(
            offsets,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(35)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_and_verify_stops_once_visible() {
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_string_lossy().into_owned();
        let runner = ScriptedRunner::new();
        let visible = Arc::new(AtomicBool::new(false));
        {
            let visible = visible.clone();
            runner.on_launch(move |_| {
                visible.store(true, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let visible = visible.clone();
            let name = name.clone();
            runner.on_output("tasklist", move |_| {
                if visible.load(Ordering::SeqCst) {
                    format!("\"{}\",\"4242\",\"Console\",\"1\",\"9,000 K\"", name)
                } else {
                    String::new()
                }
            });
        }
        let (controller, _) = controller(&runner, Platform::Windows);

        assert!(controller.launch_and_verify(&exe, 3, Duration::from_secs(5)).await);
        assert_eq!(runner.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_and_verify_missing_binary_is_terminal() {
        let runner = ScriptedRunner::new();
        let (controller, events) = controller(&runner, Platform::Windows);

        let launched = controller
            .launch_and_verify(Path::new("/no/such/Docker Desktop.exe"), 3, Duration::from_secs(5))
            .await;

        assert!(!launched);
        assert!(runner.launches().is_empty());
        assert!(runner.calls().is_empty());
        assert!(events.contains(LogLevel::Error, "Executable not found"));
    }
}
