//! Schedule preview

use anyhow::Result;
use chrono::{Duration, NaiveTime};
use colored::*;
use drydock_core::domain::schedule::{next_run_after, parse_time_of_day};
use drydock_daemon::scheduler::{Clock, SystemClock};

use crate::config::Config;

/// Print the next scheduled run and how long until it
///
/// # Arguments
/// * `config` - The CLI configuration
/// * `at` - Time of day (HH:MM) overriding the configured one
pub fn show_next_run(config: &Config, at: Option<String>) -> Result<()> {
    let time = resolve_time(config, at.as_deref())?;
    let now = SystemClock.now();
    let next = next_run_after(now, time);

    println!("{}", "Next maintenance run:".bold());
    println!("  At:   {}", next.format("%Y-%m-%d %H:%M").to_string().cyan());
    println!("  In:   {}", format_wait(next - now));

    Ok(())
}

fn resolve_time(config: &Config, at: Option<&str>) -> Result<NaiveTime> {
    match at {
        Some(value) => parse_time_of_day(value)
            .ok_or_else(|| anyhow::anyhow!("Invalid time of day '{}', expected HH:MM", value)),
        None => Ok(config.daemon.maintenance_time),
    }
}

/// Formats a wait as hours and minutes, rounding partial minutes up
fn format_wait(wait: Duration) -> String {
    let minutes = (wait.num_seconds() + 59) / 60;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
