use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exit code the tools report when an operator cancelled the run.
pub const CANCELLED_EXIT_CODE: i32 = 9;
/// Exit code recorded when the unit of work itself faulted.
pub const GENERIC_ERROR_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    AcpExport,
    AcpImport,
    Averify,
    FileCopy,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::AcpExport => "acp-export",
            JobType::AcpImport => "acp-import",
            JobType::Averify => "averify",
            JobType::FileCopy => "file-copy",
        }
    }

    /// Name of the log file the tool itself writes into its working directory.
    pub fn tool_log_name(&self) -> Option<&'static str> {
        match self {
            JobType::AcpExport => Some("export.log"),
            JobType::AcpImport => Some("import.log"),
            JobType::FileCopy => Some("filecopy.log"),
            JobType::Averify => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Error | JobStatus::Cancelled
        )
    }

    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => JobStatus::Success,
            CANCELLED_EXIT_CODE => JobStatus::Cancelled,
            _ => JobStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Unknown,
    Success,
    Warning,
    Error,
    Cancelled,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Cancelled => "CANCELLED",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record a unit of work hands back to the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub log: String,
    pub output_files: BTreeMap<String, PathBuf>,
    pub exit_code: i32,
    pub severity: Severity,
    pub analysis: Option<serde_json::Value>,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log: String,
    pub output_files: BTreeMap<String, PathBuf>,
    pub exit_code: Option<i32>,
    pub severity: Severity,
    pub analysis: Option<serde_json::Value>,
    pub summary: String,
}

impl Job {
    pub fn new(id: String, job_type: JobType) -> Self {
        Self {
            id,
            job_type,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            log: String::new(),
            output_files: BTreeMap::new(),
            exit_code: None,
            severity: Severity::Unknown,
            analysis: None,
            summary: String::new(),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            job_type: self.job_type,
            status: self.status,
            created_at: self.created_at,
            finished_at: self.finished_at,
            summary: self.summary.clone(),
            exit_code: self.exit_code,
            severity: self.severity,
            analysis: self.analysis.clone(),
            output_files: self.output_files.clone(),
            log_length: self.log.len(),
        }
    }

    pub fn outcome(&self) -> JobOutcomeView {
        JobOutcomeView {
            job_id: self.id.clone(),
            exit_code: self.exit_code,
            severity: self.severity,
            analysis: self.analysis.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// Read-only copy of a job handed out to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub exit_code: Option<i32>,
    pub severity: Severity,
    pub analysis: Option<serde_json::Value>,
    pub output_files: BTreeMap<String, PathBuf>,
    pub log_length: usize,
}

impl JobSnapshot {
    pub fn finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Terminal outcome of a job, enough to render status without the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcomeView {
    pub job_id: String,
    pub exit_code: Option<i32>,
    pub severity: Severity,
    pub analysis: Option<serde_json::Value>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.job_type.map_or(true, |t| t == job.job_type)
            && self.status.map_or(true, |s| s == job.status)
    }
}
