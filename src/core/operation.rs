use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::analysis;
use crate::core::backend::ExecutionBackend;
use crate::core::command::ToolInvocation;
use crate::core::config::ToolCommands;
use crate::core::error::FlowError;
use crate::core::formatter::format_report;
use crate::core::job::{JobOutcome, JobType};

const EXPORT_ARTIFACT_EXTENSIONS: [&str; 2] = ["xml", "zip"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportParams {
    pub host: String,
    pub product_line: String,
    pub config: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportParams {
    pub host: String,
    pub config: PathBuf,
    pub bundle: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyParams {
    pub host: String,
    pub source_env: String,
    pub target_env: String,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopyParams {
    pub host: String,
    pub target_env: String,
    pub config: PathBuf,
}

/// One unit of work a job can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Export(ExportParams),
    Import(ImportParams),
    Verify(VerifyParams),
    FileCopy(FileCopyParams),
}

impl Operation {
    pub fn job_type(&self) -> JobType {
        match self {
            Operation::Export(_) => JobType::AcpExport,
            Operation::Import(_) => JobType::AcpImport,
            Operation::Verify(_) => JobType::Averify,
            Operation::FileCopy(_) => JobType::FileCopy,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Operation::Export(p) => &p.host,
            Operation::Import(p) => &p.host,
            Operation::Verify(p) => &p.host,
            Operation::FileCopy(p) => &p.host,
        }
    }
}

pub struct OperationRunner<'a> {
    backend: &'a dyn ExecutionBackend,
    commands: &'a ToolCommands,
}

impl<'a> OperationRunner<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend, commands: &'a ToolCommands) -> Self {
        Self { backend, commands }
    }

    pub fn run(&self, operation: &Operation, work_dir: &Path) -> Result<JobOutcome, FlowError> {
        let invocation = match operation {
            Operation::Export(p) => {
                let config = stage_input(&p.config, work_dir)?;
                ToolInvocation::new(&self.commands.export)?
                    .flag("host", &p.host)
                    .flag("product-line", &p.product_line)
                    .flag("config", config)
            }
            Operation::Import(p) => {
                let config = stage_input(&p.config, work_dir)?;
                let bundle = stage_input(&p.bundle, work_dir)?;
                ToolInvocation::new(&self.commands.import)?
                    .flag("host", &p.host)
                    .flag("config", config)
                    .flag("bundle", bundle)
            }
            Operation::Verify(p) => {
                let config = match &p.config {
                    Some(path) if path.exists() => Some(stage_input(path, work_dir)?),
                    _ => None,
                };
                ToolInvocation::new(&self.commands.averify)?
                    .flag("host", &p.host)
                    .flag("source", &p.source_env)
                    .flag("target", &p.target_env)
                    .flag_opt("config", config)
            }
            Operation::FileCopy(p) => {
                let config = stage_input(&p.config, work_dir)?;
                ToolInvocation::new(&self.commands.filecopy)?
                    .flag("host", &p.host)
                    .flag("target", &p.target_env)
                    .flag("config", config)
            }
        };

        let result = self
            .backend
            .run(&invocation.to_command_line(), work_dir)?;
        let analysis = analysis::analyze(&result.output, result.exit_code);
        let mut log = result.output;

        let output_files = match operation {
            Operation::Export(_) => {
                match discover_artifacts(work_dir, &EXPORT_ARTIFACT_EXTENSIONS) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!("artifact scan failed after the tool ran: {err}");
                        if !log.is_empty() && !log.ends_with('\n') {
                            log.push('\n');
                        }
                        log.push_str(&format!("WARNING: output files not collected: {err}\n"));
                        BTreeMap::new()
                    }
                }
            }
            _ => BTreeMap::new(),
        };

        Ok(JobOutcome {
            summary: format_report(&analysis),
            analysis: Some(analysis.to_json()),
            exit_code: analysis.exit_code,
            severity: analysis.severity,
            output_files,
            log,
        })
    }
}

/// Copies `source` into `work_dir` under its base name and returns that name.
/// A missing source is tolerated; the tool reports the missing file itself.
pub fn stage_input(source: &Path, work_dir: &Path) -> Result<String, FlowError> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FlowError::invalid(format!("{} has no file name", source.display())))?;
    let dest = work_dir.join(&name);

    if !source.exists() {
        warn!("input {} does not exist, not staged", source.display());
        return Ok(name);
    }
    if same_file(source, &dest) {
        return Ok(name);
    }

    fs::copy(source, &dest).map_err(|err| FlowError::Stage {
        path: source.to_path_buf(),
        source: err,
    })?;
    debug!("staged {} into {}", source.display(), work_dir.display());
    Ok(name)
}

/// True when both paths resolve to the same existing file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Files in `dir` with one of `extensions`, keyed by base name.
pub fn discover_artifacts(
    dir: &Path,
    extensions: &[&str],
) -> Result<BTreeMap<String, PathBuf>, FlowError> {
    let entries = fs::read_dir(dir).map_err(|err| FlowError::io(dir, err))?;
    let mut found = BTreeMap::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!("skipping unreadable entry in {}: {err}", dir.display());
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| extensions.contains(&ext));
        if !matches {
            continue;
        }
        let absolute = fs::canonicalize(&path).unwrap_or(path);
        if let Some(name) = absolute.file_name().map(|n| n.to_string_lossy().into_owned()) {
            found.insert(name, absolute);
        }
    }
    Ok(found)
}
