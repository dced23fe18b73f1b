//! Configuration module
//!
//! The CLI reads the same environment as the daemon; only the log file can
//! be overridden on the command line.

use anyhow::{Context, Result};
use drydock_daemon::config::Config as DaemonConfig;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Daemon settings used for one-shot runs and schedule previews
    pub daemon: DaemonConfig,
}

impl Config {
    /// Loads daemon settings from the environment
    ///
    /// A one-shot run appends to the event log instead of clearing it.
    pub fn load(log_file: Option<PathBuf>) -> Result<Self> {
        let mut daemon = DaemonConfig::from_env();
        daemon.truncate_log_on_start = false;
        if let Some(log_file) = log_file {
            daemon.log_file = log_file;
        }
        daemon.validate().context("Invalid configuration")?;
        Ok(Self { daemon })
    }
}
