use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use propflow::core::config::{Settings, ToolCommands};
use propflow::core::service::{
    ExportRequest, FileCopyRequest, ImportRequest, ModeRequest, SshRequest, VerifyRequest,
};

#[derive(Debug, Parser)]
#[command(name = "propflow", version, about = "Run and track content propagation jobs")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Root directory for per-job working directories
    #[arg(long, env = "WORK_DIR", default_value = "./work", global = true)]
    pub work_dir: PathBuf,
    #[arg(long, env = "ACP_EXPORT_CMD", default_value = "./acp export", global = true)]
    pub export_cmd: String,
    #[arg(long, env = "ACP_IMPORT_CMD", default_value = "./acp import", global = true)]
    pub import_cmd: String,
    #[arg(long, env = "AVERIFY_CMD", default_value = "./averify", global = true)]
    pub averify_cmd: String,
    #[arg(long, env = "FILECOPY_CMD", default_value = "./filecopy", global = true)]
    pub filecopy_cmd: String,
    /// Simulate the tools instead of running them
    #[arg(long, env = "DEMO_MODE", global = true)]
    pub demo: bool,
    /// Simulated run time in seconds
    #[arg(long, env = "DEMO_JOB_DURATION", default_value_t = 5, global = true)]
    pub demo_duration: u64,
    /// JSON file with environment records (tag, projectDir)
    #[arg(long, env = "ENVIRONMENTS_FILE", global = true)]
    pub environments: Option<PathBuf>,
    /// How often the job log is polled while a job runs
    #[arg(long, default_value_t = 500, global = true)]
    pub log_interval_ms: u64,
}

impl GlobalArgs {
    pub fn settings(&self) -> Settings {
        Settings {
            work_dir: self.work_dir.clone(),
            commands: ToolCommands {
                export: self.export_cmd.clone(),
                import: self.import_cmd.clone(),
                averify: self.averify_cmd.clone(),
                filecopy: self.filecopy_cmd.clone(),
            },
            demo_mode: self.demo,
            demo_duration: Duration::from_secs(self.demo_duration),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export a bundle with the ACP export tool
    Export(ExportArgs),
    /// Import a bundle with the ACP import tool
    Import(ImportArgs),
    /// Compare two environments with averify
    Verify(VerifyArgs),
    /// Copy attachment files to a target environment
    FileCopy(FileCopyArgs),
    /// Analyze an existing tool log
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Local,
    Ssh,
}

#[derive(Debug, Args)]
pub struct RemoteArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Local)]
    pub mode: ModeArg,
    /// SSH host; defaults to --host
    #[arg(long)]
    pub ssh_host: Option<String>,
    #[arg(long)]
    pub ssh_user: Option<String>,
    #[arg(long)]
    pub ssh_port: Option<u16>,
    #[arg(long, env = "SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,
    /// Private key file for SSH authentication
    #[arg(long)]
    pub ssh_key: Option<String>,
}

impl RemoteArgs {
    fn mode(&self) -> ModeRequest {
        match self.mode {
            ModeArg::Local => ModeRequest::Local,
            ModeArg::Ssh => ModeRequest::Ssh,
        }
    }

    fn ssh(&self) -> SshRequest {
        SshRequest {
            host: self.ssh_host.clone(),
            username: self.ssh_user.clone(),
            port: self.ssh_port,
            password: self.ssh_password.clone(),
            key_file: self.ssh_key.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long = "product-line")]
    pub product_line: String,
    /// ACP XML configuration file
    #[arg(long)]
    pub config: PathBuf,
    /// Source environment tag, used to find its project directory
    #[arg(long = "source-env")]
    pub source_env: Option<String>,
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bundle: Option<PathBuf>,
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long = "source-env")]
    pub source_env: String,
    #[arg(long = "target-env")]
    pub target_env: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Args)]
pub struct FileCopyArgs {
    #[arg(long, default_value = "")]
    pub host: String,
    #[arg(long = "target-env")]
    pub target_env: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    pub file: PathBuf,
    /// Exit code the tool reported
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub exit_code: i32,
    /// Print the analysis as JSON instead of the text report
    #[arg(long)]
    pub json: bool,
}

pub fn export_request(args: ExportArgs) -> ExportRequest {
    ExportRequest {
        mode: args.remote.mode(),
        ssh: args.remote.ssh(),
        host: args.host,
        product_line: args.product_line,
        config: Some(args.config),
        source_env: args.source_env,
    }
}

pub fn import_request(args: ImportArgs) -> ImportRequest {
    ImportRequest {
        mode: args.remote.mode(),
        ssh: args.remote.ssh(),
        host: args.host,
        config: args.config,
        bundle: args.bundle,
    }
}

pub fn verify_request(args: VerifyArgs) -> VerifyRequest {
    VerifyRequest {
        mode: args.remote.mode(),
        ssh: args.remote.ssh(),
        host: args.host,
        source_env: args.source_env,
        target_env: args.target_env,
        config: args.config,
    }
}

pub fn file_copy_request(args: FileCopyArgs) -> FileCopyRequest {
    FileCopyRequest {
        mode: args.remote.mode(),
        ssh: args.remote.ssh(),
        host: args.host,
        target_env: args.target_env,
        config: args.config,
    }
}
