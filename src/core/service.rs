//! Create-and-start entry points for each operation kind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::core::backend::ExecutionMode;
use crate::core::config::Settings;
use crate::core::demo;
use crate::core::environment::{EnvironmentStore, PROJECT_CONFIG_NAME};
use crate::core::error::FlowError;
use crate::core::job::{JobOutcomeView, JobType};
use crate::core::manager::JobManager;
use crate::core::operation::{
    same_file, ExportParams, FileCopyParams, ImportParams, Operation, OperationRunner,
    VerifyParams,
};
use crate::core::ssh::{SshTarget, DEFAULT_SSH_PORT};

static RE_UNSAFE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// SSH options as supplied by a caller; `host` falls back to the job host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshRequest {
    pub host: Option<String>,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeRequest {
    #[default]
    Local,
    Ssh,
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub host: String,
    pub product_line: String,
    pub config: Option<PathBuf>,
    pub source_env: Option<String>,
    pub mode: ModeRequest,
    pub ssh: SshRequest,
}

#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub host: String,
    pub config: Option<PathBuf>,
    pub bundle: Option<PathBuf>,
    pub mode: ModeRequest,
    pub ssh: SshRequest,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub host: String,
    pub source_env: String,
    pub target_env: String,
    pub config: Option<PathBuf>,
    pub mode: ModeRequest,
    pub ssh: SshRequest,
}

#[derive(Debug, Clone, Default)]
pub struct FileCopyRequest {
    pub host: String,
    pub target_env: String,
    pub config: Option<PathBuf>,
    pub mode: ModeRequest,
    pub ssh: SshRequest,
}

pub struct JobService {
    manager: JobManager,
    settings: Settings,
    environments: Arc<dyn EnvironmentStore>,
}

impl JobService {
    pub fn new(
        manager: JobManager,
        settings: Settings,
        environments: Arc<dyn EnvironmentStore>,
    ) -> Self {
        Self {
            manager,
            settings,
            environments,
        }
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn submit_export(&self, req: ExportRequest) -> Result<String, FlowError> {
        let host = required("host", &req.host)?;
        let product_line = required("productLine", &req.product_line)?;
        let mut config = req
            .config
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| FlowError::invalid("xmlConfig is required"))?;
        let mode = resolve_mode(req.mode, &req.ssh, &host)?;

        let project_dir = req
            .source_env
            .as_deref()
            .and_then(|tag| self.environments.find_by_tag(tag))
            .and_then(|env| env.existing_project_dir().map(Path::to_path_buf));

        let redirect = match project_dir {
            Some(dir) if config.exists() => {
                let dest = dir.join(PROJECT_CONFIG_NAME);
                if !same_file(&config, &dest) {
                    fs::copy(&config, &dest).map_err(|err| FlowError::Stage {
                        path: config.clone(),
                        source: err,
                    })?;
                }
                config = dest;
                Some(dir)
            }
            _ => None,
        };

        let (job_id, work_dir) = match redirect {
            Some(dir) => {
                let job_id = self.manager.create(JobType::AcpExport);
                info!(job_id = %job_id, "running export in project directory {}", dir.display());
                (job_id, dir)
            }
            None => self.create_job(JobType::AcpExport)?,
        };

        let operation = Operation::Export(ExportParams {
            host,
            product_line,
            config,
        });
        self.launch(job_id, operation, mode, work_dir)
    }

    pub fn submit_import(&self, req: ImportRequest) -> Result<String, FlowError> {
        let host = required("host", &req.host)?;
        let (config, bundle) = if self.settings.demo_mode {
            (
                req.config.unwrap_or_default(),
                req.bundle.unwrap_or_default(),
            )
        } else {
            (
                required_path("xmlConfig", req.config)?,
                required_path("exportBundle", req.bundle)?,
            )
        };
        let mode = resolve_mode(req.mode, &req.ssh, &host)?;

        let operation = Operation::Import(ImportParams {
            host,
            config,
            bundle,
        });
        self.submit(operation, mode)
    }

    pub fn submit_verify(&self, req: VerifyRequest) -> Result<String, FlowError> {
        let host = required("host", &req.host)?;
        let source_env = required("sourceEnv", &req.source_env)?;
        let target_env = required("targetEnv", &req.target_env)?;
        let mode = resolve_mode(req.mode, &req.ssh, &host)?;

        let operation = Operation::Verify(VerifyParams {
            host,
            source_env,
            target_env,
            config: req.config,
        });
        self.submit(operation, mode)
    }

    pub fn submit_file_copy(&self, req: FileCopyRequest) -> Result<String, FlowError> {
        let target_env = required("targetEnv", &req.target_env)?;
        let (host, config) = if self.settings.demo_mode {
            (req.host.trim().to_string(), req.config.unwrap_or_default())
        } else {
            (
                required("host", &req.host)?,
                required_path("configFile", req.config)?,
            )
        };
        let mode = resolve_mode(req.mode, &req.ssh, &host)?;

        let operation = Operation::FileCopy(FileCopyParams {
            host,
            target_env,
            config,
        });
        self.submit(operation, mode)
    }

    pub fn outcome(&self, job_id: &str) -> Result<JobOutcomeView, FlowError> {
        self.manager
            .outcome(job_id)
            .ok_or_else(|| FlowError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Absolute path of a job artifact; the first one when no name is given.
    pub fn resolve_artifact(
        &self,
        job_id: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, FlowError> {
        let job = self.manager.get(job_id).ok_or_else(|| FlowError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        let missing = |message: &str| FlowError::ArtifactNotFound {
            job_id: job_id.to_string(),
            message: message.to_string(),
        };
        if job.output_files.is_empty() {
            return Err(missing("no output files for this job"));
        }

        let path = match filename {
            Some(name) => job
                .output_files
                .get(sanitize_filename(name).as_str())
                .cloned()
                .ok_or_else(|| missing("requested file not found for this job"))?,
            None => job
                .output_files
                .values()
                .next()
                .cloned()
                .ok_or_else(|| missing("no output files for this job"))?,
        };

        if !path.exists() {
            return Err(missing("output file no longer exists"));
        }
        Ok(path)
    }

    /// The tool's own log file from the job's working directory.
    pub fn tool_log(&self, job_id: &str) -> Result<(String, String), FlowError> {
        let job_type = self
            .manager
            .job_type(job_id)
            .ok_or_else(|| FlowError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        let name = job_type.tool_log_name().ok_or_else(|| {
            FlowError::invalid(format!("no tool log file for {job_type} jobs"))
        })?;
        let path = self.manager.work_dir(job_id)?.join(name);
        let text = fs::read_to_string(&path).map_err(|err| FlowError::io(&path, err))?;
        Ok((name.to_string(), text))
    }

    fn submit(&self, operation: Operation, mode: ExecutionMode) -> Result<String, FlowError> {
        let (job_id, work_dir) = self.create_job(operation.job_type())?;
        self.launch(job_id, operation, mode, work_dir)
    }

    /// A job whose directory cannot be created is never left behind as pending.
    fn create_job(&self, job_type: JobType) -> Result<(String, PathBuf), FlowError> {
        let job_id = self.manager.create(job_type);
        match self.manager.work_dir(&job_id) {
            Ok(dir) => Ok((job_id, dir)),
            Err(err) => {
                let _ = self.manager.delete(&job_id);
                Err(err)
            }
        }
    }

    fn launch(
        &self,
        job_id: String,
        operation: Operation,
        mode: ExecutionMode,
        work_dir: PathBuf,
    ) -> Result<String, FlowError> {
        let demo_delay = self.settings.demo_mode.then_some(self.settings.demo_duration);
        let commands = self.settings.commands.clone();

        self.manager.start(&job_id, move || match demo_delay {
            Some(delay) => demo::simulate(&operation, &work_dir, delay),
            None => {
                let backend = mode.backend();
                OperationRunner::new(backend.as_ref(), &commands).run(&operation, &work_dir)
            }
        })?;
        Ok(job_id)
    }
}

pub fn sanitize_filename(name: &str) -> String {
    RE_UNSAFE_FILENAME.replace_all(name, "_").into_owned()
}

fn required(field: &str, value: &str) -> Result<String, FlowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FlowError::invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn required_path(field: &str, value: Option<PathBuf>) -> Result<PathBuf, FlowError> {
    value
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| FlowError::invalid(format!("{field} is required")))
}

fn resolve_mode(mode: ModeRequest, ssh: &SshRequest, host: &str) -> Result<ExecutionMode, FlowError> {
    match mode {
        ModeRequest::Local => Ok(ExecutionMode::Local),
        ModeRequest::Ssh => {
            let username = ssh
                .username
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| FlowError::invalid("ssh.username required for SSH mode"))?;
            let host = ssh
                .host
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .unwrap_or(host);
            if host.is_empty() {
                return Err(FlowError::invalid("ssh.host or host is required for SSH mode"));
            }
            Ok(ExecutionMode::Ssh(SshTarget {
                host: host.to_string(),
                username: username.to_string(),
                port: ssh.port.unwrap_or(DEFAULT_SSH_PORT),
                password: ssh.password.clone(),
                key_file: ssh.key_file.clone(),
            }))
        }
    }
}
