//! External command execution
//!
//! Handles the process lifecycle for every command the daemon issues:
//! - Spawning with stdout/stderr captured separately
//! - Enforcing a hard timeout that takes down the whole process tree
//! - Classifying the outcome as success, non-zero exit, timeout or launch failure
//! - Reporting each invocation and its outcome to the event log

use async_trait::async_trait;
use drydock_core::HostError;
use drydock_core::domain::command::{CommandResult, CommandSpec};
use drydock_core::error::Result;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::event_log::EventLog;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion
    ///
    /// # Arguments
    /// * `command` - Program and arguments
    /// * `timeout` - Hard deadline; the process tree is killed when it passes
    ///
    /// # Returns
    /// The captured result for a zero exit code, otherwise a typed failure
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<CommandResult>;

    /// Starts a GUI or background executable without waiting for it
    async fn launch(&self, program: &Path) -> Result<()>;
}

/// CommandRunner backed by real OS processes
pub struct SystemCommandRunner {
    events: Arc<dyn EventLog>,
}

impl SystemCommandRunner {
    pub fn new(events: Arc<dyn EventLog>) -> Self {
        Self { events }
    }

    fn build(command: &CommandSpec) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(command.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down grandchildren too
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }

    async fn execute(&self, command: &CommandSpec, timeout: Duration) -> Result<CommandResult> {
        let rendered = command.to_string();
        let started = Instant::now();

        let mut child = Self::build(command)
            .spawn()
            .map_err(|e| HostError::launch_failed(&rendered, e))?;

        // Captured now; tokio forgets the pid once the child is reaped
        let pid = child.id();
        let mut stdout = tokio::spawn(read_stream(child.stdout.take()));
        let mut stderr = tokio::spawn(read_stream(child.stderr.take()));

        // One deadline covers the exit and the drain, since grandchildren can
        // hold the pipes open after the child itself is gone
        let finished = tokio::time::timeout_at(started + timeout, async {
            let status = child.wait().await?;
            let (out, err) = tokio::join!(&mut stdout, &mut stderr);
            Ok::<_, std::io::Error>((status, out.unwrap_or_default(), err.unwrap_or_default()))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                stdout.abort();
                stderr.abort();
                return Err(HostError::launch_failed(&rendered, e));
            }
            Err(_) => {
                terminate_tree(&mut child, pid).await;
                stdout.abort();
                stderr.abort();
                return Err(HostError::TimeoutExceeded {
                    command: rendered,
                    timeout,
                });
            }
        };

        // Killed by a signal on Unix
        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if exit_code != 0 {
            return Err(HostError::CommandFailed {
                command: rendered,
                exit_code,
                stderr,
                stdout,
            });
        }

        Ok(CommandResult {
            command: rendered,
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<CommandResult> {
        self.events
            .debug(&format!("Executing command: {}", command));

        let result = self.execute(command, timeout).await;

        match &result {
            Ok(output) => {
                self.events.debug(&format!(
                    "Command completed in {} ms: {}\nstdout: {}\nstderr: {}",
                    output.duration_ms,
                    output.command,
                    output.stdout.trim(),
                    output.stderr.trim()
                ));
            }
            Err(HostError::CommandFailed {
                command,
                exit_code,
                stderr,
                stdout,
            }) => {
                self.events.error(&format!(
                    "Command failed: {}. exit_code={} Error: {} (Stdout: {})",
                    command,
                    exit_code,
                    stderr.trim(),
                    stdout.trim()
                ));
            }
            Err(e) => self.events.error(&e.to_string()),
        }

        result
    }

    async fn launch(&self, program: &Path) -> Result<()> {
        let rendered = program.display().to_string();
        self.events
            .debug(&format!("Launching detached executable: {}", rendered));

        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);

        match cmd.spawn() {
            // Dropping the handle leaves the process running
            Ok(child) => {
                self.events.debug(&format!(
                    "Launched {} (pid {})",
                    rendered,
                    child.id().map(|id| id.to_string()).unwrap_or_default()
                ));
                Ok(())
            }
            Err(e) => {
                let err = HostError::launch_failed(rendered, e);
                self.events.error(&err.to_string());
                Err(err)
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        // Partial output is still worth keeping
        let _ = stream.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Kills a timed-out child together with everything it started
///
/// `pid` is the child's pid from spawn time, which is also its process group.
async fn terminate_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Ok(pid) = i32::try_from(pid) {
                let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
            }
        }

        #[cfg(windows)]
        {
            let _ = Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .creation_flags(CREATE_NO_WINDOW)
                .status()
                .await;
        }
    }

    let _ = child.kill().await;
}
