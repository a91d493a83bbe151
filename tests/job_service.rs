#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use propflow::core::config::{Settings, ToolCommands};
use propflow::core::environment::{Environment, StaticEnvironments};
use propflow::core::service::{
    ExportRequest, FileCopyRequest, ImportRequest, ModeRequest, SshRequest, VerifyRequest,
};
use propflow::core::{FlowError, JobManager, JobService, JobStatus, JobType, Severity};
use tempfile::{tempdir, TempDir};

const WAIT: Duration = Duration::from_secs(20);

const FAKE_EXPORT: &str = r#"
echo "Export started"
echo "[INFO] Connected"
echo "[WARN] slow response from server"
echo "exported 3 objects"
echo "tool noise on stderr" >&2
echo "<bundle/>" > bundle.xml
echo "zip" > bundle.zip
echo "Summary:"
echo "Elapsed: 2s"
exit 0
"#;

struct Fixture {
    _scratch: TempDir,
    root: PathBuf,
    uploads: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let scratch = tempdir().unwrap();
        let root = scratch.path().join("work");
        let uploads = scratch.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        Self {
            root,
            uploads,
            _scratch: scratch,
        }
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.uploads.join(name);
        fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    fn upload(&self, name: &str, body: &str) -> PathBuf {
        let path = self.uploads.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn service(&self, commands: ToolCommands, environments: Vec<Environment>) -> JobService {
        self.service_with(
            Settings {
                work_dir: self.root.clone(),
                commands,
                demo_mode: false,
                demo_duration: Duration::ZERO,
            },
            environments,
        )
    }

    fn service_with(&self, settings: Settings, environments: Vec<Environment>) -> JobService {
        let manager = JobManager::new(&settings.work_dir).unwrap();
        JobService::new(
            manager,
            settings,
            Arc::new(StaticEnvironments::new(environments)),
        )
    }
}

fn export_request(host: &str, config: &Path) -> ExportRequest {
    ExportRequest {
        host: host.to_string(),
        product_line: "Line A".to_string(),
        config: Some(config.to_path_buf()),
        ..ExportRequest::default()
    }
}

#[test]
fn export_runs_tool_and_collects_artifacts() {
    let fx = Fixture::new();
    let commands = ToolCommands {
        export: fx.script("fake_export.sh", FAKE_EXPORT),
        ..ToolCommands::default()
    };
    let service = fx.service(commands, Vec::new());
    let config = fx.upload("propagate.xml", "<acp/>");

    let id = service.submit_export(export_request("plm01", &config)).unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.severity, Severity::Success);
    assert!(job.output_files.contains_key("bundle.zip"));
    assert!(job.output_files.contains_key("bundle.xml"));
    assert!(job.output_files.values().all(|path| path.is_absolute()));

    let (log, _) = service.manager().log_chunk(&id, 0);
    assert!(log.starts_with(&format!("Job {id} started\n")));
    assert!(log.contains("tool noise on stderr"));
    assert!(log.ends_with(&format!("Job {id} finished with status success\n")));

    let analysis = job.analysis.unwrap();
    assert_eq!(analysis["stats"]["processedItems"], 3);
    assert_eq!(analysis["stats"]["warningCount"], 1);
    assert_eq!(analysis["duration"], "2s");

    let bundle = service.resolve_artifact(&id, Some("bundle.zip")).unwrap();
    assert_eq!(fs::read_to_string(bundle).unwrap(), "zip\n");
    assert!(service.resolve_artifact(&id, None).is_ok());
    assert!(matches!(
        service.resolve_artifact(&id, Some("../bundle.zip")),
        Err(FlowError::ArtifactNotFound { .. })
    ));

    let view = service.outcome(&id).unwrap();
    assert_eq!(view.exit_code, Some(0));
    assert!(view.summary.contains("ACP OPERATION SUMMARY"));
}

#[test]
fn log_content_overrides_clean_exit() {
    let fx = Fixture::new();
    let commands = ToolCommands {
        import: fx.script(
            "fake_import.sh",
            "echo '[ERROR] Authentication failed for admin'\nexit 0\n",
        ),
        ..ToolCommands::default()
    };
    let service = fx.service(commands, Vec::new());
    let request = ImportRequest {
        host: "plm02".to_string(),
        config: Some(fx.upload("import.xml", "<acp/>")),
        bundle: Some(fx.upload("bundle.zip", "zip")),
        ..ImportRequest::default()
    };

    let id = service.submit_import(request).unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.exit_code, Some(3));
    assert_eq!(job.severity, Severity::Error);
    assert!(matches!(
        service.resolve_artifact(&id, None),
        Err(FlowError::ArtifactNotFound { .. })
    ));
}

#[test]
fn cancelled_exit_code_marks_job_cancelled() {
    let fx = Fixture::new();
    let commands = ToolCommands {
        averify: fx.script("fake_verify.sh", "echo 'stopping'\nexit 9\n"),
        ..ToolCommands::default()
    };
    let service = fx.service(commands, Vec::new());
    let id = service
        .submit_verify(VerifyRequest {
            host: "plm01".to_string(),
            source_env: "DEV".to_string(),
            target_env: "QA".to_string(),
            ..VerifyRequest::default()
        })
        .unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.severity, Severity::Cancelled);
}

#[test]
fn missing_tool_fails_the_job() {
    let fx = Fixture::new();
    let commands = ToolCommands {
        export: "./definitely-not-installed-acp export".to_string(),
        ..ToolCommands::default()
    };
    let service = fx.service(commands, Vec::new());
    let config = fx.upload("propagate.xml", "<acp/>");
    let id = service.submit_export(export_request("plm01", &config)).unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    // sh reports "not found" with exit code 127
    assert_eq!(job.exit_code, Some(127));
}

#[test]
fn invalid_requests_create_no_job() {
    let fx = Fixture::new();
    let service = fx.service(ToolCommands::default(), Vec::new());
    let config = fx.upload("propagate.xml", "<acp/>");

    let no_host = service.submit_export(export_request("  ", &config));
    assert!(matches!(no_host, Err(FlowError::InvalidRequest { .. })));

    let no_config = service.submit_export(ExportRequest {
        config: None,
        ..export_request("plm01", &config)
    });
    assert!(matches!(no_config, Err(FlowError::InvalidRequest { .. })));

    let no_bundle = service.submit_import(ImportRequest {
        host: "plm01".to_string(),
        config: Some(config.clone()),
        ..ImportRequest::default()
    });
    assert!(matches!(no_bundle, Err(FlowError::InvalidRequest { .. })));

    let ssh_without_user = service.submit_verify(VerifyRequest {
        host: "plm01".to_string(),
        source_env: "DEV".to_string(),
        target_env: "QA".to_string(),
        mode: ModeRequest::Ssh,
        ssh: SshRequest::default(),
        ..VerifyRequest::default()
    });
    assert!(matches!(
        ssh_without_user,
        Err(FlowError::InvalidRequest { .. })
    ));

    let no_target = service.submit_file_copy(FileCopyRequest {
        host: "plm01".to_string(),
        config: Some(config),
        ..FileCopyRequest::default()
    });
    assert!(matches!(no_target, Err(FlowError::InvalidRequest { .. })));

    assert!(service.manager().list(Default::default()).is_empty());
}

#[test]
fn unreachable_ssh_host_is_a_transport_fault() {
    let fx = Fixture::new();
    let service = fx.service(ToolCommands::default(), Vec::new());
    let id = service
        .submit_verify(VerifyRequest {
            host: "127.0.0.1".to_string(),
            source_env: "DEV".to_string(),
            target_env: "QA".to_string(),
            mode: ModeRequest::Ssh,
            ssh: SshRequest {
                username: Some("acp".to_string()),
                port: Some(1),
                password: Some("secret".to_string()),
                ..SshRequest::default()
            },
            ..VerifyRequest::default()
        })
        .unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.exit_code, None);
    assert_eq!(job.severity, Severity::Critical);
}

#[test]
fn export_runs_in_source_project_directory() {
    let fx = Fixture::new();
    let project = fx.uploads.join("dev-project");
    fs::create_dir_all(&project).unwrap();
    let commands = ToolCommands {
        export: fx.script("fake_export.sh", FAKE_EXPORT),
        ..ToolCommands::default()
    };
    let service = fx.service(
        commands,
        vec![Environment {
            tag: "DEV".to_string(),
            project_dir: Some(project.clone()),
        }],
    );
    let config = fx.upload("propagate.xml", "<acp source=\"dev\"/>");

    let id = service
        .submit_export(ExportRequest {
            source_env: Some("DEV".to_string()),
            ..export_request("plm01", &config)
        })
        .unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(
        fs::read_to_string(project.join("config.xml")).unwrap(),
        "<acp source=\"dev\"/>"
    );
    assert!(project.join("bundle.zip").is_file());
    let canonical_project = fs::canonicalize(&project).unwrap();
    assert!(job.output_files["bundle.zip"].starts_with(&canonical_project));
}

#[test]
fn export_config_already_in_project_directory_is_kept() {
    let fx = Fixture::new();
    let project = fx.uploads.join("dev-project");
    fs::create_dir_all(&project).unwrap();
    let config = project.join("config.xml");
    fs::write(&config, "<acp important=\"yes\"/>").unwrap();
    let commands = ToolCommands {
        export: fx.script("fake_export.sh", "cat config.xml\n"),
        ..ToolCommands::default()
    };
    let service = fx.service(
        commands,
        vec![Environment {
            tag: "DEV".to_string(),
            project_dir: Some(project.clone()),
        }],
    );

    let id = service
        .submit_export(ExportRequest {
            source_env: Some("DEV".to_string()),
            ..export_request("plm01", &config)
        })
        .unwrap();
    service.manager().wait(&id, WAIT).unwrap();

    assert_eq!(
        fs::read_to_string(&config).unwrap(),
        "<acp important=\"yes\"/>"
    );
    let (log, _) = service.manager().log_chunk(&id, 0);
    assert!(log.contains("<acp important=\"yes\"/>"));
}

#[test]
fn tool_output_survives_a_vanished_work_dir() {
    let fx = Fixture::new();
    let commands = ToolCommands {
        export: fx.script(
            "fake_export.sh",
            "echo '[INFO] exported 5 objects'\nrm -rf \"$PWD\"\n",
        ),
        ..ToolCommands::default()
    };
    let service = fx.service(commands, Vec::new());
    let config = fx.upload("propagate.xml", "<acp/>");

    let id = service.submit_export(export_request("plm01", &config)).unwrap();
    let job = service.manager().wait(&id, WAIT).unwrap();

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.output_files.is_empty());
    assert_eq!(job.analysis.unwrap()["stats"]["processedItems"], 5);
    let (log, _) = service.manager().log_chunk(&id, 0);
    assert!(log.contains("[INFO] exported 5 objects\n"));
    assert!(log.contains("WARNING: output files not collected"));
}

#[test]
fn demo_mode_simulates_every_operation() {
    let fx = Fixture::new();
    let service = fx.service_with(
        Settings {
            work_dir: fx.root.clone(),
            commands: ToolCommands::default(),
            demo_mode: true,
            demo_duration: Duration::ZERO,
        },
        Vec::new(),
    );

    let export = service
        .submit_export(ExportRequest {
            host: "plm01".to_string(),
            product_line: "Line A".to_string(),
            config: Some(PathBuf::from("not-uploaded.xml")),
            ..ExportRequest::default()
        })
        .unwrap();
    let import = service
        .submit_import(ImportRequest {
            host: "plm01".to_string(),
            ..ImportRequest::default()
        })
        .unwrap();
    let copy = service
        .submit_file_copy(FileCopyRequest {
            target_env: "UAT".to_string(),
            ..FileCopyRequest::default()
        })
        .unwrap();

    for id in [&export, &import, &copy] {
        let job = service.manager().wait(id, WAIT).unwrap();
        assert_eq!(job.status, JobStatus::Success, "job {id}");
    }

    let (name, text) = service.tool_log(&export).unwrap();
    assert_eq!(name, "export.log");
    assert!(text.contains("Product line: Line A"));
    let artifact = service.resolve_artifact(&export, None).unwrap();
    assert!(artifact
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("export_Line_A_"));

    let (name, _) = service.tool_log(&copy).unwrap();
    assert_eq!(name, "filecopy.log");
    assert_eq!(service.manager().job_type(&copy), Some(JobType::FileCopy));
}

#[test]
fn verify_jobs_have_no_tool_log() {
    let fx = Fixture::new();
    let service = fx.service_with(
        Settings {
            work_dir: fx.root.clone(),
            commands: ToolCommands::default(),
            demo_mode: true,
            demo_duration: Duration::ZERO,
        },
        Vec::new(),
    );
    let id = service
        .submit_verify(VerifyRequest {
            host: "plm01".to_string(),
            source_env: "DEV".to_string(),
            target_env: "QA".to_string(),
            ..VerifyRequest::default()
        })
        .unwrap();
    service.manager().wait(&id, WAIT).unwrap();
    assert!(matches!(
        service.tool_log(&id),
        Err(FlowError::InvalidRequest { .. })
    ));
    assert!(matches!(
        service.tool_log("missing"),
        Err(FlowError::JobNotFound { .. })
    ));
}
