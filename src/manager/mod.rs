use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Outcome of an external command that did not succeed
#[derive(Debug)]
pub enum RunError {
    /// The executable is not installed on this host
    NotFound,
    /// The command ran and exited with a non zero code
    ExitCode(i32),
    /// The command was terminated by a signal before it could exit
    Killed,
    /// The command could not be started for any other reason
    Spawn(io::Error),
}

impl RunError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunError::NotFound)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::NotFound => write!(f, "command not found"),
            RunError::ExitCode(code) => write!(f, "{}", code),
            RunError::Killed => write!(f, "terminated by signal"),
            RunError::Spawn(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RunError {}

/// Runs external tools like systemctl or chkconfig.
///
/// Implementations must tell a missing tool apart from a tool that ran and
/// failed, the init.d fallback chain depends on it.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), RunError>;
}

/// Runs commands on the local host and waits for them to exit
#[derive(Clone, Debug, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> CommandRunner {
        CommandRunner
    }

    fn classify(status: ExitStatus) -> Result<(), RunError> {
        if status.success() {
            return Ok(());
        }

        match status.code() {
            Some(code) => Err(RunError::ExitCode(code)),
            None => Err(RunError::Killed),
        }
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), RunError> {
        debug!("running {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => Self::classify(status),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(RunError::NotFound),
            Err(err) => Err(RunError::Spawn(err)),
        }
    }
}
