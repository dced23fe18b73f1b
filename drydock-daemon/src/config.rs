//! Daemon configuration
//!
//! Defines all configurable parameters for the daemon: the maintenance time of
//! day, relaunch retry policy, timeouts, Docker and WSL names, backing-file
//! search paths and the event-log location.

use chrono::NaiveTime;
use drydock_core::domain::schedule::parse_time_of_day;
use std::path::PathBuf;
use std::time::Duration;

use crate::host::controller::process_name;

/// Daemon configuration
///
/// All timeouts and retry counts are configurable so the same binary can be
/// tuned for slow disks or slow Docker Desktop starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local time of day of the daily maintenance run
    pub maintenance_time: NaiveTime,

    /// Run once immediately when the daemon starts
    pub run_on_start: bool,

    /// Desktop relaunch attempts
    pub launch_attempts: u32,

    /// Wait after the first relaunch attempt; doubles per attempt
    pub launch_backoff: Duration,

    /// How long to wait for a service to reach a requested state
    pub service_convergence_timeout: Duration,

    /// How long to wait for the Docker daemon to answer after a relaunch
    pub daemon_start_timeout: Duration,

    /// Interval between daemon health checks while waiting for it
    pub daemon_poll_interval: Duration,

    /// Timeout for short commands (queries, kills, service requests)
    pub command_timeout: Duration,

    /// Timeout for `docker system prune`
    pub prune_timeout: Duration,

    /// Timeout for compacting one backing file
    pub compaction_timeout: Duration,

    /// Docker Desktop executable
    pub desktop_executable: PathBuf,

    /// Docker daemon/CLI process name
    pub daemon_process: String,

    /// Kernel-integration (WSL) service name
    pub kernel_service: String,

    /// Profile directory searched for the Docker backing files
    pub user_profile: PathBuf,

    /// Extra files or directories holding backing files
    pub vhd_search_paths: Vec<PathBuf>,

    /// Plain-file event log
    pub log_file: PathBuf,

    /// Clear the event log when the daemon starts
    pub truncate_log_on_start: bool,
}

impl Config {
    /// Creates a configuration with defaults for the given profile directory
    pub fn new(user_profile: PathBuf) -> Self {
        Self {
            maintenance_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            run_on_start: true,
            launch_attempts: 3,
            launch_backoff: Duration::from_secs(5),
            service_convergence_timeout: Duration::from_secs(60),
            daemon_start_timeout: Duration::from_secs(60),
            daemon_poll_interval: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            prune_timeout: Duration::from_secs(30 * 60),
            compaction_timeout: Duration::from_secs(2 * 60 * 60),
            desktop_executable: PathBuf::from(
                r"C:\Program Files\Docker\Docker\Docker Desktop.exe",
            ),
            daemon_process: "docker.exe".to_string(),
            kernel_service: "WSLService".to_string(),
            user_profile,
            vhd_search_paths: Vec::new(),
            log_file: default_log_file(),
            truncate_log_on_start: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - DRYDOCK_MAINTENANCE_TIME (HH:MM, default: 02:00)
    /// - DRYDOCK_RUN_ON_START (bool, default: true)
    /// - DRYDOCK_LAUNCH_ATTEMPTS (default: 3)
    /// - DRYDOCK_LAUNCH_BACKOFF (seconds, default: 5)
    /// - DRYDOCK_CONVERGENCE_TIMEOUT (seconds, default: 60)
    /// - DRYDOCK_DAEMON_START_TIMEOUT (seconds, default: 60)
    /// - DRYDOCK_COMMAND_TIMEOUT (seconds, default: 30)
    /// - DRYDOCK_PRUNE_TIMEOUT (seconds, default: 1800)
    /// - DRYDOCK_COMPACTION_TIMEOUT (seconds, default: 7200)
    /// - DRYDOCK_DESKTOP_EXE, DRYDOCK_DAEMON_PROCESS, DRYDOCK_KERNEL_SERVICE
    /// - DRYDOCK_USER_PROFILE (falls back to USERPROFILE, then HOME)
    /// - DRYDOCK_VHD_PATHS (OS path list)
    /// - DRYDOCK_LOG_FILE
    /// - DRYDOCK_TRUNCATE_LOG (bool, default: true)
    ///
    /// Unparseable values are ignored in favor of the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let user_profile = lookup("DRYDOCK_USER_PROFILE")
            .or_else(|| lookup("USERPROFILE"))
            .or_else(|| lookup("HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::new(user_profile);

        let secs = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let flag = |key: &str| lookup(key).and_then(|s| parse_bool(&s));
        let text = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        if let Some(time) = lookup("DRYDOCK_MAINTENANCE_TIME").and_then(|s| parse_time_of_day(&s)) {
            config.maintenance_time = time;
        }
        if let Some(run_on_start) = flag("DRYDOCK_RUN_ON_START") {
            config.run_on_start = run_on_start;
        }
        if let Some(attempts) = lookup("DRYDOCK_LAUNCH_ATTEMPTS").and_then(|s| s.trim().parse().ok()) {
            config.launch_attempts = attempts;
        }
        if let Some(backoff) = secs("DRYDOCK_LAUNCH_BACKOFF") {
            config.launch_backoff = backoff;
        }
        if let Some(timeout) = secs("DRYDOCK_CONVERGENCE_TIMEOUT") {
            config.service_convergence_timeout = timeout;
        }
        if let Some(timeout) = secs("DRYDOCK_DAEMON_START_TIMEOUT") {
            config.daemon_start_timeout = timeout;
        }
        if let Some(timeout) = secs("DRYDOCK_COMMAND_TIMEOUT") {
            config.command_timeout = timeout;
        }
        if let Some(timeout) = secs("DRYDOCK_PRUNE_TIMEOUT") {
            config.prune_timeout = timeout;
        }
        if let Some(timeout) = secs("DRYDOCK_COMPACTION_TIMEOUT") {
            config.compaction_timeout = timeout;
        }
        if let Some(exe) = text("DRYDOCK_DESKTOP_EXE") {
            config.desktop_executable = PathBuf::from(exe);
        }
        if let Some(process) = text("DRYDOCK_DAEMON_PROCESS") {
            config.daemon_process = process;
        }
        if let Some(service) = text("DRYDOCK_KERNEL_SERVICE") {
            config.kernel_service = service;
        }
        if let Some(paths) = text("DRYDOCK_VHD_PATHS") {
            config.vhd_search_paths = std::env::split_paths(&paths).collect();
        }
        if let Some(log_file) = text("DRYDOCK_LOG_FILE") {
            config.log_file = PathBuf::from(log_file);
        }
        if let Some(truncate) = flag("DRYDOCK_TRUNCATE_LOG") {
            config.truncate_log_on_start = truncate;
        }

        config
    }

    /// Process name of the desktop executable
    pub fn desktop_process(&self) -> String {
        process_name(&self.desktop_executable)
    }

    /// Marker file written next to the event log at startup
    pub fn startup_marker(&self) -> PathBuf {
        self.log_file.with_file_name("startup.txt")
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.launch_attempts == 0 {
            anyhow::bail!("launch_attempts must be greater than 0");
        }

        if self.launch_backoff.is_zero() {
            anyhow::bail!("launch_backoff must be greater than 0");
        }

        if self.command_timeout.is_zero() {
            anyhow::bail!("command_timeout must be greater than 0");
        }

        if self.prune_timeout.is_zero() || self.compaction_timeout.is_zero() {
            anyhow::bail!("prune and compaction timeouts must be greater than 0");
        }

        if self.daemon_poll_interval.is_zero() {
            anyhow::bail!("daemon_poll_interval must be greater than 0");
        }

        if self.desktop_process().is_empty() {
            anyhow::bail!("desktop_executable must name a file");
        }

        if self.daemon_process.trim().is_empty() {
            anyhow::bail!("daemon_process cannot be empty");
        }

        if self.kernel_service.trim().is_empty() {
            anyhow::bail!("kernel_service cannot be empty");
        }

        if self.log_file.file_name().is_none() {
            anyhow::bail!("log_file must name a file");
        }

        Ok(())
    }
}

fn default_log_file() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Temp\maintenance_service.log")
    } else {
        std::env::temp_dir()
            .join("drydock")
            .join("maintenance_service.log")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
