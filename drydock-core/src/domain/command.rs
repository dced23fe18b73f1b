//! External command types
//!
//! A [`CommandSpec`] describes what to run; a [`CommandResult`] is what came back.
//! Shell interpreters receive their payload as a single command string so that
//! quoting and `$env:` expansion keep working; every other program gets a
//! discrete argument list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Shell interpreters that take a command string behind a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    PowerShell,
    Cmd,
    Posix,
}

impl Shell {
    /// Detects the interpreter from a program name or path
    ///
    /// Matching is case-insensitive and ignores a trailing `.exe`.
    pub fn detect(program: &str) -> Option<Shell> {
        let file_name = Path::new(program)
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| program.to_lowercase());
        let stem = file_name.strip_suffix(".exe").unwrap_or(&file_name);

        match stem {
            "powershell" | "pwsh" => Some(Shell::PowerShell),
            "cmd" => Some(Shell::Cmd),
            "sh" | "bash" => Some(Shell::Posix),
            _ => None,
        }
    }

    /// Arguments placed before the command string
    pub fn command_flags(&self) -> &'static [&'static str] {
        match self {
            Shell::PowerShell => &["-NoProfile", "-NonInteractive", "-Command"],
            Shell::Cmd => &["/C"],
            Shell::Posix => &["-c"],
        }
    }
}

/// How arguments are handed to the program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArgs {
    /// Discrete argument list, passed through untouched
    Argv(Vec<String>),
    /// A single command string for a shell interpreter
    Script(String),
}

/// An external command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: CommandArgs,
}

impl CommandSpec {
    /// Creates a command with a discrete argument list
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: CommandArgs::Argv(args.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a command whose payload is a single interpreter command string
    pub fn script(program: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: CommandArgs::Script(script.into()),
        }
    }

    /// Shorthand for a PowerShell command string
    pub fn powershell(script: impl Into<String>) -> Self {
        Self::script("powershell", script)
    }

    /// The argument vector actually passed to the OS
    ///
    /// A script aimed at a program that is not a known interpreter is passed
    /// as one argument.
    pub fn argv(&self) -> Vec<String> {
        match &self.args {
            CommandArgs::Argv(args) => args.clone(),
            CommandArgs::Script(script) => match Shell::detect(&self.program) {
                Some(shell) => shell
                    .command_flags()
                    .iter()
                    .map(|flag| flag.to_string())
                    .chain(std::iter::once(script.clone()))
                    .collect(),
                None => vec![script.clone()],
            },
        }
    }
}

impl fmt::Display for CommandSpec {
    /// Human-readable command line for logs and error messages
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        match &self.args {
            CommandArgs::Argv(args) => {
                for arg in args {
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        write!(f, " \"{}\"", arg)?;
                    } else {
                        write!(f, " {}", arg)?;
                    }
                }
                Ok(())
            }
            CommandArgs::Script(script) => write!(f, " {}", script),
        }
    }
}

/// Captured outcome of one command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Rendered command line
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Non-empty, trimmed stdout lines
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_detection() {
        assert_eq!(Shell::detect("powershell"), Some(Shell::PowerShell));
        assert_eq!(Shell::detect("PowerShell.exe"), Some(Shell::PowerShell));
        assert_eq!(Shell::detect("pwsh"), Some(Shell::PowerShell));
        assert_eq!(Shell::detect("cmd.exe"), Some(Shell::Cmd));
        assert_eq!(Shell::detect("/bin/sh"), Some(Shell::Posix));
        assert_eq!(Shell::detect("docker"), None);
        assert_eq!(Shell::detect("wsl.exe"), None);
    }

    #[test]
    fn test_script_goes_behind_interpreter_flag() {
        let spec = CommandSpec::powershell("Optimize-VHD -Path \"$env:LOCALAPPDATA\\x.vhdx\"");
        assert_eq!(
            spec.argv(),
            vec![
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "Optimize-VHD -Path \"$env:LOCALAPPDATA\\x.vhdx\""
            ]
        );
    }

    #[test]
    fn test_argv_passed_untouched() {
        let spec = CommandSpec::new("docker", ["system", "prune", "--all"]);
        assert_eq!(spec.argv(), vec!["system", "prune", "--all"]);
        assert_eq!(spec.to_string(), "docker system prune --all");
    }

    #[test]
    fn test_script_for_plain_program_is_single_argument() {
        let spec = CommandSpec::script("wsl", "--shutdown");
        assert_eq!(spec.argv(), vec!["--shutdown"]);
    }

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::new("taskkill", ["/F", "/IM", "Docker Desktop.exe"]);
        assert_eq!(spec.to_string(), "taskkill /F /IM \"Docker Desktop.exe\"");
    }

    #[test]
    fn test_stdout_lines_skip_blanks() {
        let result = CommandResult {
            command: "docker ps -a -q".to_string(),
            exit_code: 0,
            stdout: "abc\n\n  def  \n".to_string(),
            stderr: String::new(),
            duration_ms: 3,
        };
        assert!(result.success());
        assert_eq!(result.stdout_lines().collect::<Vec<_>>(), vec!["abc", "def"]);
    }
}
