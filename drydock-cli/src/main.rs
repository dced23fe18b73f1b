//! Drydock CLI
//!
//! Command-line companion to the maintenance daemon: run maintenance once,
//! read the event log, preview the schedule.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drydock")]
#[command(about = "Docker Desktop / WSL maintenance", long_about = None)]
struct Cli {
    /// Plain-file event log written by the daemon
    #[arg(long, global = true, env = "DRYDOCK_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.log_file)?;

    handle_command(cli.command, &config).await
}
