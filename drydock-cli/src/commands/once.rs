//! One-shot maintenance run
//!
//! Runs the full pipeline in the foreground and prints its report. Ctrl-C
//! stops the run between steps, the same way the daemon does.

use anyhow::{Context, Result};
use colored::*;
use drydock_core::domain::report::{MaintenanceRunReport, PipelineStepOutcome};
use drydock_daemon::context::MaintenanceContext;
use drydock_daemon::service::MaintenanceTask;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs maintenance once and prints the report
///
/// # Arguments
/// * `config` - The CLI configuration
/// * `json` - Print the report as JSON instead of a table
///
/// # Returns
/// An error when the run did not succeed, after the report is printed
pub async fn run_once(config: &Config, json: bool) -> Result<()> {
    let context = MaintenanceContext::new(config.daemon.clone());
    let pipeline = context.pipeline();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Stop requested; finishing the current step...".yellow());
                cancel.cancel();
            }
        });
    }

    if !json {
        println!(
            "{}",
            format!("Running maintenance (log: {})", config.daemon.log_file.display()).bold()
        );
    }

    let report = pipeline.run(&cancel).await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", rendered);
    } else {
        print_report(&report);
    }

    if !report.overall_succeeded {
        anyhow::bail!("{}", report.summary());
    }
    Ok(())
}

/// Print a run report as a step table
fn print_report(report: &MaintenanceRunReport) {
    println!();
    println!("{}", "Maintenance Run:".bold());
    println!("  ID:        {}", report.run_id.to_string().cyan());
    println!(
        "  Started:   {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(duration) = report.duration() {
        println!("  Duration:  {}s", duration.num_seconds());
    }

    println!("\n{}", "Steps:".bold());
    for outcome in &report.steps {
        println!("  {}", step_line(outcome));
    }

    println!();
    let summary = report.summary();
    if report.overall_succeeded {
        println!("{}", summary.green());
    } else if report.cancelled {
        println!("{}", summary.dimmed());
    } else {
        println!("{}", summary.red());
    }
}

fn step_line(outcome: &PipelineStepOutcome) -> String {
    let marker = if outcome.succeeded {
        "✓".green()
    } else if outcome.fatal {
        "✗".red()
    } else {
        "!".yellow()
    };
    format!(
        "{} {}. {:<22} {}",
        marker,
        outcome.step.number(),
        outcome.name,
        outcome.detail.dimmed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use drydock_core::domain::report::MaintenanceStep;

    #[test]
    fn test_step_line_layout() {
        colored::control::set_override(false);
        let line = step_line(&PipelineStepOutcome::fatal(
            MaintenanceStep::Prune,
            "Docker prune failed",
        ));
        assert_eq!(line, format!("✗ 3. {:<22} Docker prune failed", "prune"));
    }
}
