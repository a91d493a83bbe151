//! In-memory job registry.
//!
//! Every job runs its unit of work on its own thread. All job state lives in
//! one table behind one mutex; the worker thread is the only writer of its
//! job's log and outcome fields once the job is running.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::error::Error as _;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::error::FlowError;
use crate::core::job::{
    Job, JobFilter, JobOutcome, JobOutcomeView, JobSnapshot, JobStatus, JobType, Severity,
    GENERIC_ERROR_EXIT_CODE,
};

#[derive(Default)]
struct JobTable {
    jobs: HashMap<String, Job>,
    order: Vec<String>,
}

#[derive(Default)]
struct Shared {
    table: Mutex<JobTable>,
    finished: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct JobManager {
    work_root: PathBuf,
    shared: Arc<Shared>,
}

impl JobManager {
    pub fn new(work_root: impl Into<PathBuf>) -> Result<Self, FlowError> {
        let work_root = work_root.into();
        fs::create_dir_all(&work_root).map_err(|err| FlowError::io(&work_root, err))?;
        Ok(Self {
            work_root,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn create(&self, job_type: JobType) -> String {
        let job_id = Uuid::new_v4().to_string();
        let mut table = self.shared.lock();
        table
            .jobs
            .insert(job_id.clone(), Job::new(job_id.clone(), job_type));
        table.order.push(job_id.clone());
        info!(job_id = %job_id, job_type = %job_type, "job created");
        job_id
    }

    pub fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.shared.lock().jobs.get(job_id).map(Job::snapshot)
    }

    pub fn job_type(&self, job_id: &str) -> Option<JobType> {
        self.shared.lock().jobs.get(job_id).map(|job| job.job_type)
    }

    pub fn list(&self, filter: JobFilter) -> Vec<JobSnapshot> {
        let table = self.shared.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id))
            .filter(|job| filter.matches(job))
            .map(Job::snapshot)
            .collect()
    }

    pub fn outcome(&self, job_id: &str) -> Option<JobOutcomeView> {
        self.shared.lock().jobs.get(job_id).map(Job::outcome)
    }

    /// Private directory for the job, created on first use.
    pub fn work_dir(&self, job_id: &str) -> Result<PathBuf, FlowError> {
        if !self.shared.lock().jobs.contains_key(job_id) {
            return Err(FlowError::JobNotFound {
                job_id: job_id.to_string(),
            });
        }
        let path = self.work_root.join(job_id);
        fs::create_dir_all(&path).map_err(|err| FlowError::io(&path, err))?;
        Ok(path)
    }

    /// Moves the job to `running` and executes `work` on a new thread.
    pub fn start<F>(&self, job_id: &str, work: F) -> Result<(), FlowError>
    where
        F: FnOnce() -> Result<JobOutcome, FlowError> + Send + 'static,
    {
        {
            let mut table = self.shared.lock();
            let job = table
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| FlowError::JobNotFound {
                    job_id: job_id.to_string(),
                })?;
            if job.status != JobStatus::Pending {
                return Err(FlowError::invalid(format!(
                    "job {job_id} already {}",
                    job.status
                )));
            }
            job.status = JobStatus::Running;
            job.log.push_str(&format!("Job {job_id} started\n"));
        }
        info!(job_id = %job_id, "job started");

        let shared = Arc::clone(&self.shared);
        let worker_id = job_id.to_string();
        let spawned = thread::Builder::new()
            .name(format!("job-{}", short_id(job_id)))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(work));
                finish(&shared, &worker_id, result);
            });

        if let Err(err) = spawned {
            let shared = Arc::clone(&self.shared);
            let fault = FlowError::Spawn {
                command: format!("worker thread for job {job_id}"),
                source: err,
            };
            finish(&shared, job_id, Ok(Err(fault)));
        }
        Ok(())
    }

    /// Log text appended since `offset`, and the offset for the next call.
    pub fn log_chunk(&self, job_id: &str, offset: usize) -> (String, usize) {
        let table = self.shared.lock();
        let Some(job) = table.jobs.get(job_id) else {
            return (String::new(), offset);
        };
        match job.log.get(offset..) {
            Some(chunk) => (chunk.to_string(), offset + chunk.len()),
            None => (String::new(), offset),
        }
    }

    /// Removes a job that is not running, along with its private directory.
    pub fn delete(&self, job_id: &str) -> Result<bool, FlowError> {
        {
            let mut table = self.shared.lock();
            match table.jobs.get(job_id) {
                None => return Ok(false),
                Some(job) if job.status == JobStatus::Running => {
                    return Err(FlowError::JobActive {
                        job_id: job_id.to_string(),
                    });
                }
                Some(_) => {}
            }
            table.jobs.remove(job_id);
            table.order.retain(|id| id != job_id);
        }

        let dir = self.work_root.join(job_id);
        if dir.exists() {
            if let Err(err) = fs::remove_dir_all(&dir) {
                warn!(job_id = %job_id, "failed to remove work dir {}: {err}", dir.display());
            }
        }
        info!(job_id = %job_id, "job deleted");
        Ok(true)
    }

    /// Blocks until the job is terminal or `timeout` elapses.
    pub fn wait(&self, job_id: &str, timeout: Duration) -> Option<JobSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut table = self.shared.lock();
        loop {
            let job = table.jobs.get(job_id)?;
            if job.status.is_terminal() {
                return Some(job.snapshot());
            }
            let now = Instant::now();
            if now >= deadline {
                return Some(job.snapshot());
            }
            table = match self.shared.finished.wait_timeout(table, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

type WorkResult = thread::Result<Result<JobOutcome, FlowError>>;

fn finish(shared: &Shared, job_id: &str, result: WorkResult) {
    let mut table = shared.lock();
    let Some(job) = table.jobs.get_mut(job_id) else {
        warn!(job_id = %job_id, "job vanished before it finished");
        return;
    };

    match result {
        Ok(Ok(outcome)) => apply_outcome(job, outcome),
        Ok(Err(err)) => {
            error!(job_id = %job_id, "job failed: {err}");
            job.log.push_str(&describe_fault(&err));
            job.exit_code = if err.is_transport() {
                None
            } else {
                Some(GENERIC_ERROR_EXIT_CODE)
            };
            job.severity = Severity::Critical;
            job.status = JobStatus::Error;
            job.summary = err.to_string();
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(job_id = %job_id, "job panicked: {message}");
            job.log.push_str(&format!(
                "ERROR: {message}\n{}\n",
                Backtrace::force_capture()
            ));
            job.exit_code = Some(GENERIC_ERROR_EXIT_CODE);
            job.severity = Severity::Critical;
            job.status = JobStatus::Error;
            job.summary = message;
        }
    }

    job.finished_at = Some(Utc::now());
    job.log.push_str(&format!(
        "Job {job_id} finished with status {}\n",
        job.status
    ));
    info!(job_id = %job_id, status = %job.status, exit_code = ?job.exit_code, "job finished");
    drop(table);
    shared.finished.notify_all();
}

fn apply_outcome(job: &mut Job, outcome: JobOutcome) {
    debug!(job_id = %job.id, bytes = outcome.log.len(), "applying job outcome");
    job.log.push_str(&outcome.log);
    job.output_files = outcome.output_files;
    job.exit_code = Some(outcome.exit_code);
    job.severity = outcome.severity;
    job.analysis = outcome.analysis;
    job.status = JobStatus::from_exit_code(outcome.exit_code);
    job.summary = outcome.summary;
}

fn describe_fault(err: &FlowError) -> String {
    let headline = err.to_string();
    let mut text = format!("ERROR: {headline}\n");
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // Several variants already render their source inline.
        if !headline.contains(&cause_text) {
            text.push_str(&format!("  caused by: {cause_text}\n"));
        }
        source = cause.source();
    }
    text
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unit of work panicked".to_string()
    }
}

fn short_id(job_id: &str) -> &str {
    job_id.get(..8).unwrap_or(job_id)
}
