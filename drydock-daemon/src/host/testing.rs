//! Scripted host for tests
//!
//! Commands are matched by prefix against their rendered command line; the
//! most recently registered rule wins. Unmatched commands succeed with empty
//! output. Every call is recorded with the (tokio) time it was issued.

use async_trait::async_trait;
use drydock_core::HostError;
use drydock_core::domain::command::{CommandResult, CommandSpec};
use drydock_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::host::runner::CommandRunner;

type Handler = Arc<dyn Fn(&CommandSpec) -> Result<CommandResult> + Send + Sync>;
type LaunchHandler = Arc<dyn Fn(&Path) -> Result<()> + Send + Sync>;

pub(crate) fn output(command: &CommandSpec, stdout: &str) -> CommandResult {
    CommandResult {
        command: command.to_string(),
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration_ms: 1,
    }
}

pub(crate) fn command_failed(
    command: &CommandSpec,
    exit_code: i32,
    stdout: &str,
    stderr: &str,
) -> HostError {
    HostError::CommandFailed {
        command: command.to_string(),
        exit_code,
        stderr: stderr.to_string(),
        stdout: stdout.to_string(),
    }
}

#[derive(Default)]
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<(String, Handler)>>,
    calls: Mutex<Vec<(String, Instant)>>,
    launches: Mutex<Vec<PathBuf>>,
    launch_handler: Mutex<Option<LaunchHandler>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(
        &self,
        prefix: &str,
        handler: impl Fn(&CommandSpec) -> Result<CommandResult> + Send + Sync + 'static,
    ) {
        self.rules
            .lock()
            .unwrap()
            .push((prefix.to_string(), Arc::new(handler)));
    }

    pub fn on_output(
        &self,
        prefix: &str,
        stdout: impl Fn(&CommandSpec) -> String + Send + Sync + 'static,
    ) {
        self.on(prefix, move |command| Ok(output(command, &stdout(command))));
    }

    pub fn ok(&self, prefix: &str, stdout: &str) {
        let stdout = stdout.to_string();
        self.on(prefix, move |command| Ok(output(command, &stdout)));
    }

    pub fn fail(&self, prefix: &str, exit_code: i32, stderr: &str) {
        let stderr = stderr.to_string();
        self.on(prefix, move |command| {
            Err(command_failed(command, exit_code, "", &stderr))
        });
    }

    pub fn time_out(&self, prefix: &str) {
        self.on(prefix, |command| {
            Err(HostError::TimeoutExceeded {
                command: command.to_string(),
                timeout: Duration::from_secs(30),
            })
        });
    }

    pub fn on_launch(&self, handler: impl Fn(&Path) -> Result<()> + Send + Sync + 'static) {
        *self.launch_handler.lock().unwrap() = Some(Arc::new(handler));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub fn call_times(&self, prefix: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(command, _)| command.starts_with(prefix))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.call_times(prefix).len()
    }

    pub fn launches(&self) -> Vec<PathBuf> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec, _timeout: Duration) -> Result<CommandResult> {
        let rendered = command.to_string();
        self.calls
            .lock()
            .unwrap()
            .push((rendered.clone(), Instant::now()));

        let handler = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .map(|(_, handler)| handler.clone());

        match handler {
            Some(handler) => handler(command),
            None => Ok(output(command, "")),
        }
    }

    async fn launch(&self, program: &Path) -> Result<()> {
        self.launches.lock().unwrap().push(program.to_path_buf());
        let handler = self.launch_handler.lock().unwrap().clone();
        match handler {
            Some(handler) => handler(program),
            None => Ok(()),
        }
    }
}
