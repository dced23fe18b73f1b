//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod logs;
mod next_run;
mod once;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the maintenance pipeline once in the foreground
    Once {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the daemon's event log
    Logs {
        /// Log file to read (defaults to the configured one)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Minimum level: debug, info, warning or error
        #[arg(long)]
        level: Option<String>,

        /// Only the last N entries
        #[arg(long)]
        tail: Option<usize>,

        /// Only entries containing this text (case-insensitive)
        #[arg(long)]
        grep: Option<String>,
    },
    /// Show when the next scheduled run happens
    NextRun {
        /// Time of day to compute for instead of the configured one (HH:MM)
        #[arg(long)]
        at: Option<String>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Once { json } => once::run_once(config, json).await,
        Commands::Logs {
            file,
            level,
            tail,
            grep,
        } => logs::show_logs(config, file, level, tail, grep),
        Commands::NextRun { at } => next_run::show_next_run(config, at),
    }
}
