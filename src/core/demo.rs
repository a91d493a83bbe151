//! Stand-in unit of work used when the real tools are not installed.
//!
//! Produces tool-shaped logs after an artificial delay and runs them through
//! the same analysis as a real job.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::warn;

use crate::core::analysis;
use crate::core::error::FlowError;
use crate::core::formatter::format_elapsed;
use crate::core::job::JobOutcome;
use crate::core::operation::Operation;

const BANNER_WIDTH: usize = 70;
const VERIFY_STEPS: [&str; 11] = [
    "Connecting to source database...",
    "Connecting to target database...",
    "Loading verification configuration",
    "Comparing schema structures...",
    "Comparing Classes...",
    "Comparing Workflows...",
    "Comparing Users and Groups...",
    "Comparing Attributes...",
    "Analyzing differences...",
    "Generating comparison report...",
    "Verification completed!",
];

pub fn simulate(
    operation: &Operation,
    work_dir: &Path,
    delay: Duration,
) -> Result<JobOutcome, FlowError> {
    let started = Local::now();
    let clock = Instant::now();

    let (header, body, summary, output_files) = match operation {
        Operation::Export(p) => {
            thread::sleep(delay);
            let body = tool_log("Export", started, clock.elapsed(), &[
                format!("[INFO] Connected to {}", p.host),
                format!("[INFO] Product line: {}", p.product_line),
                "[INFO] Exporting classes".to_string(),
                "[INFO] Exporting workflows".to_string(),
                "[INFO] exported 2 objects".to_string(),
            ]);
            write_tool_log(work_dir, "export.log", &body);
            let name = format!(
                "export_{}_{}.zip",
                sanitize(&p.product_line),
                started.timestamp()
            );
            let artifact = write_artifact(work_dir, &name, "demo export bundle\n")?;
            (
                format!(
                    "[DEMO MODE] Starting ACP Export\nHost: {}\nProduct Line: {}\n",
                    p.host, p.product_line
                ),
                body,
                format!("Export completed successfully for {}", p.product_line),
                BTreeMap::from([(name, artifact)]),
            )
        }
        Operation::Import(p) => {
            thread::sleep(delay);
            let body = tool_log("Import", started, clock.elapsed(), &[
                format!("[INFO] Connected to {}", p.host),
                "[INFO] Reading bundle".to_string(),
                "[INFO] imported 2 objects".to_string(),
            ]);
            write_tool_log(work_dir, "import.log", &body);
            (
                format!("[DEMO MODE] Starting ACP Import\nHost: {}\n", p.host),
                body,
                "Import completed successfully".to_string(),
                BTreeMap::new(),
            )
        }
        Operation::Verify(p) => {
            let step_delay = delay / VERIFY_STEPS.len() as u32;
            let mut body = String::new();
            for (idx, step) in VERIFY_STEPS.iter().enumerate() {
                thread::sleep(step_delay);
                body.push_str(&format!("[{}/{}] {step}\n", idx + 1, VERIFY_STEPS.len()));
            }
            body.push_str("\n=== Verification Summary ===\n");
            body.push_str("Total objects compared: 500\n");
            body.push_str("Matching: 90%\n");
            body.push_str("Differences found: 10\n");
            body.push_str(&format!(
                "Operation completed successfully in {} seconds\n",
                delay.as_secs()
            ));
            (
                format!(
                    "[DEMO MODE] Starting Averify\nSource Environment: {}\nTarget Environment: {}\n",
                    p.source_env, p.target_env
                ),
                body,
                format!(
                    "Verification completed for {} and {}",
                    p.source_env, p.target_env
                ),
                BTreeMap::new(),
            )
        }
        Operation::FileCopy(p) => {
            thread::sleep(delay);
            let body = tool_log("File Copy", started, clock.elapsed(), &[
                format!("Target Environment:     {}", p.target_env),
                "[INFO] Copying attachment files".to_string(),
                "[INFO] completed 178 items".to_string(),
            ]);
            write_tool_log(work_dir, "filecopy.log", &body);
            let name = "filecopy_summary.txt".to_string();
            let artifact = write_artifact(work_dir, &name, &body)?;
            (
                format!(
                    "[DEMO MODE] Starting File Copy\nTarget Environment: {}\n",
                    p.target_env
                ),
                body,
                format!("File copy completed successfully to {}", p.target_env),
                BTreeMap::from([(name, artifact)]),
            )
        }
    };

    let log = format!(
        "{header}Simulated run of {} seconds\n\n{}\n\n{body}",
        delay.as_secs(),
        "=".repeat(BANNER_WIDTH)
    );
    let analysis = analysis::analyze(&log, 0);

    Ok(JobOutcome {
        exit_code: analysis.exit_code,
        severity: analysis.severity,
        analysis: Some(analysis.to_json()),
        output_files,
        summary,
        log,
    })
}

fn tool_log(
    operation: &str,
    started: chrono::DateTime<Local>,
    elapsed: Duration,
    lines: &[String],
) -> String {
    let finished = started + chrono::Duration::from_std(elapsed).unwrap_or_default();
    let stamp = "%b %d, %Y %I:%M:%S %p";
    let mut log = format!("{operation} started: {}\n", started.format(stamp));
    for line in lines {
        log.push_str(line);
        log.push('\n');
    }
    log.push_str("Summary:\n");
    log.push_str(&format!("  {operation} finished: {}\n", finished.format(stamp)));
    log.push_str(&format!("  Elapsed: {}s\n", elapsed.as_secs()));
    log.push_str(&format!("  Total time {}\n", format_elapsed(elapsed)));
    log
}

fn write_tool_log(work_dir: &Path, name: &str, body: &str) {
    let path = work_dir.join(name);
    if let Err(err) = fs::write(&path, body) {
        warn!("failed to write demo log {}: {err}", path.display());
    }
}

fn write_artifact(work_dir: &Path, name: &str, body: &str) -> Result<PathBuf, FlowError> {
    let path = work_dir.join(name);
    fs::write(&path, body).map_err(|err| FlowError::io(&path, err))?;
    Ok(fs::canonicalize(&path).unwrap_or(path))
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
