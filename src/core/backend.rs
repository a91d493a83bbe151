use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::core::error::FlowError;
use crate::core::ssh::{SshBackend, SshTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// stdout and stderr combined.
    pub output: String,
}

/// Runs one shell command line in a working directory.
pub trait ExecutionBackend: Send + Sync {
    fn run(&self, command_line: &str, work_dir: &Path) -> Result<CommandOutput, FlowError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Ssh(SshTarget),
}

impl ExecutionMode {
    pub fn backend(&self) -> Box<dyn ExecutionBackend> {
        match self {
            ExecutionMode::Local => Box::new(LocalBackend),
            ExecutionMode::Ssh(target) => Box::new(SshBackend::new(target.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl ExecutionBackend for LocalBackend {
    fn run(&self, command_line: &str, work_dir: &Path) -> Result<CommandOutput, FlowError> {
        info!(work_dir = %work_dir.display(), "running local command: {command_line}");

        let mut cmd = shell_command(command_line);
        cmd.current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| FlowError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

        let output = child.wait_with_output().map_err(|source| FlowError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

        let exit_code = exit_code_of(output.status);
        debug!(exit_code, bytes = output.stdout.len(), "local command finished");

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        // Only reached if the shell itself wrote to stderr before the redirect.
        if !output.stderr.is_empty() {
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        Ok(CommandOutput {
            exit_code,
            output: text,
        })
    }
}

/// The shell merges stderr into stdout so output keeps its production order.
#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(format!("{{ {command_line}\n}} 2>&1"));
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(format!("({command_line}) 2>&1"));
    cmd
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
