//! OS service status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time status of an OS service
///
/// Derived fresh on every poll and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
    StartPending,
    StopPending,
    Unknown,
}

impl ServiceStatus {
    /// Parses the output of `sc query <name>`
    ///
    /// Looks for the `STATE : <code> <NAME>` line; the numeric code wins when
    /// both are present.
    pub fn from_sc_query(output: &str) -> Self {
        let Some(line) = output
            .lines()
            .map(str::trim)
            .find(|line| line.to_ascii_uppercase().starts_with("STATE"))
        else {
            return ServiceStatus::Unknown;
        };

        let value = line.split_once(':').map(|(_, v)| v.trim()).unwrap_or("");
        let mut parts = value.split_whitespace();
        let first = parts.next().unwrap_or("");
        let code = first.parse::<u32>().ok();
        // Some builds print only the state name
        let name = match code {
            Some(_) => parts.next().unwrap_or(""),
            None => first,
        }
        .to_ascii_uppercase();

        match (code, name.as_str()) {
            (Some(1), _) | (None, "STOPPED") => ServiceStatus::Stopped,
            (Some(2), _) | (None, "START_PENDING") => ServiceStatus::StartPending,
            (Some(3), _) | (None, "STOP_PENDING") => ServiceStatus::StopPending,
            (Some(4), _) | (None, "RUNNING") => ServiceStatus::Running,
            _ => ServiceStatus::Unknown,
        }
    }

    /// Parses the single-word output of `systemctl is-active <unit>`
    pub fn from_systemctl(output: &str) -> Self {
        match output.trim() {
            "active" | "reloading" => ServiceStatus::Running,
            "inactive" | "failed" => ServiceStatus::Stopped,
            "activating" => ServiceStatus::StartPending,
            "deactivating" => ServiceStatus::StopPending,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::StartPending => "start-pending",
            ServiceStatus::StopPending => "stop-pending",
            ServiceStatus::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SC_RUNNING: &str = r#"
SERVICE_NAME: WSLService
        TYPE               : 10  WIN32_OWN_PROCESS
        STATE              : 4  RUNNING
                                (STOPPABLE, NOT_PAUSABLE, ACCEPTS_SHUTDOWN)
        WIN32_EXIT_CODE    : 0  (0x0)
"#;

    #[test]
    fn test_sc_query_states() {
        assert_eq!(ServiceStatus::from_sc_query(SC_RUNNING), ServiceStatus::Running);
        assert_eq!(
            ServiceStatus::from_sc_query("        STATE              : 1  STOPPED"),
            ServiceStatus::Stopped
        );
        assert_eq!(
            ServiceStatus::from_sc_query("STATE : 3  STOP_PENDING"),
            ServiceStatus::StopPending
        );
        assert_eq!(
            ServiceStatus::from_sc_query("STATE : START_PENDING"),
            ServiceStatus::StartPending
        );
        assert_eq!(
            ServiceStatus::from_sc_query("STATE : running"),
            ServiceStatus::Running
        );
        assert_eq!(
            ServiceStatus::from_sc_query("[SC] OpenService FAILED 1060"),
            ServiceStatus::Unknown
        );
    }

    #[test]
    fn test_systemctl_states() {
        assert_eq!(ServiceStatus::from_systemctl("active\n"), ServiceStatus::Running);
        assert_eq!(ServiceStatus::from_systemctl("inactive"), ServiceStatus::Stopped);
        assert_eq!(ServiceStatus::from_systemctl("failed"), ServiceStatus::Stopped);
        assert_eq!(
            ServiceStatus::from_systemctl("deactivating"),
            ServiceStatus::StopPending
        );
        assert_eq!(ServiceStatus::from_systemctl(""), ServiceStatus::Unknown);
    }
}
