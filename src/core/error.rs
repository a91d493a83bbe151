use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("invalid tool command '{command}': {message}")]
    InvalidCommand { command: String, message: String },
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ssh connection to {host}:{port} failed: {message}")]
    SshConnect {
        host: String,
        port: u16,
        message: String,
    },
    #[error("ssh authentication failed for {username}@{host}: {message}")]
    SshAuth {
        host: String,
        username: String,
        message: String,
    },
    #[error("ssh channel error on {host}: {message}")]
    SshChannel { host: String, message: String },
    #[error("failed to stage {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("job {job_id} not found")]
    JobNotFound { job_id: String },
    #[error("job {job_id} is still running")]
    JobActive { job_id: String },
    #[error("artifact not found for job {job_id}: {message}")]
    ArtifactNotFound { job_id: String, message: String },
}

impl FlowError {
    pub fn invalid(message: impl Into<String>) -> Self {
        FlowError::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowError::Io {
            path: path.into(),
            source,
        }
    }

    /// The command never ran, so there is no tool exit code to report.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FlowError::Spawn { .. }
                | FlowError::SshConnect { .. }
                | FlowError::SshAuth { .. }
                | FlowError::SshChannel { .. }
        )
    }
}
