pub mod analysis;
pub mod backend;
pub mod command;
pub mod config;
pub mod demo;
pub mod environment;
pub mod error;
pub mod exit_code;
pub mod formatter;
pub mod job;
pub mod manager;
pub mod operation;
pub mod service;
pub mod ssh;

pub use analysis::{analyze, LogAnalysis};
pub use backend::{CommandOutput, ExecutionBackend, ExecutionMode, LocalBackend};
pub use error::FlowError;
pub use job::{JobFilter, JobOutcome, JobSnapshot, JobStatus, JobType, Severity};
pub use manager::JobManager;
pub use service::JobService;
