mod cli;

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propflow::core::environment::{EnvironmentStore, StaticEnvironments};
use propflow::core::formatter::format_report;
use propflow::core::{analyze, FlowError, JobManager, JobService, JobSnapshot};

use cli::{AnalyzeArgs, Cli, Commands};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "propflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

type Submit = Box<dyn FnOnce(&JobService) -> Result<String, FlowError>>;

fn run(cli: Cli) -> Result<i32, FlowError> {
    let Cli { global, command } = cli;
    let submit: Submit = match command {
        Commands::Analyze(args) => return analyze_file(args),
        Commands::Export(args) => {
            Box::new(move |s: &JobService| s.submit_export(cli::export_request(args)))
        }
        Commands::Import(args) => {
            Box::new(move |s: &JobService| s.submit_import(cli::import_request(args)))
        }
        Commands::Verify(args) => {
            Box::new(move |s: &JobService| s.submit_verify(cli::verify_request(args)))
        }
        Commands::FileCopy(args) => {
            Box::new(move |s: &JobService| s.submit_file_copy(cli::file_copy_request(args)))
        }
    };
    let service = build_service(&global)?;
    let interval = Duration::from_millis(global.log_interval_ms.max(10));

    let job_id = submit(&service)?;
    info!(job_id = %job_id, "job submitted");

    let snapshot = follow(service.manager(), &job_id, interval)?;
    println!();
    println!("{}", snapshot.summary);
    for (name, path) in &snapshot.output_files {
        println!("output: {name} -> {}", path.display());
    }
    println!(
        "status: {} (exit code {}, severity {})",
        snapshot.status,
        snapshot
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string()),
        snapshot.severity.as_str()
    );
    Ok(snapshot.exit_code.unwrap_or(1))
}

fn build_service(global: &cli::GlobalArgs) -> Result<JobService, FlowError> {
    let settings = global.settings();
    let manager = JobManager::new(&settings.work_dir)?;
    let environments: Arc<dyn EnvironmentStore> = match &global.environments {
        Some(path) => Arc::new(StaticEnvironments::from_json_file(path)?),
        None => Arc::new(StaticEnvironments::default()),
    };
    debug!(
        "work dir {}, demo mode {}",
        settings.work_dir.display(),
        settings.demo_mode
    );
    Ok(JobService::new(manager, settings, environments))
}

/// Streams the job log to stdout until the job reaches a terminal state.
fn follow(manager: &JobManager, job_id: &str, interval: Duration) -> Result<JobSnapshot, FlowError> {
    let mut offset = 0;
    let mut stdout = io::stdout();
    loop {
        let snapshot = manager.get(job_id).ok_or_else(|| FlowError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        let (chunk, next) = manager.log_chunk(job_id, offset);
        offset = next;
        if !chunk.is_empty() {
            print!("{chunk}");
            let _ = stdout.flush();
        }
        // The snapshot was taken before the read, so an empty chunk here means
        // the whole final log has been printed.
        if snapshot.finished() && chunk.is_empty() {
            return Ok(snapshot);
        }
        if chunk.is_empty() {
            thread::sleep(interval);
        }
    }
}

fn analyze_file(args: AnalyzeArgs) -> Result<i32, FlowError> {
    let text = fs::read_to_string(&args.file).map_err(|err| FlowError::io(&args.file, err))?;
    let analysis = analyze(&text, args.exit_code);
    if args.json {
        let json = serde_json::to_string_pretty(&analysis.to_json())
            .map_err(|err| FlowError::invalid(err.to_string()))?;
        println!("{json}");
    } else {
        println!("{}", format_report(&analysis));
    }
    Ok(0)
}
