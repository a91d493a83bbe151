//! Remote execution over SSH.
//!
//! One connection per command: connect, authenticate, run, disconnect. The
//! async `russh` client is driven by a current-thread runtime owned by the
//! call, so the backend stays usable from plain worker threads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{AuthResult, Config, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{ChannelMsg, Disconnect, Sig};
use tracing::{debug, info, warn};

use crate::core::backend::{CommandOutput, ExecutionBackend};
use crate::core::error::FlowError;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Exit code reported when the remote side gives no usable status.
const UNKNOWN_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub password: Option<String>,
    pub key_file: Option<String>,
}

/// Host keys are accepted unconditionally.
#[derive(Clone, Debug, Default)]
struct ClientHandler;

impl russh::client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(algorithm = %server_public_key.algorithm(), "accepting server host key");
        Ok(true)
    }
}

pub struct SshBackend {
    target: SshTarget,
    config: Arc<Config>,
}

impl SshBackend {
    pub fn new(target: SshTarget) -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        Self {
            target,
            config: Arc::new(config),
        }
    }

    async fn connect(&self) -> Result<Handle<ClientHandler>, FlowError> {
        let target = &self.target;
        info!("connecting to {}@{}:{}", target.username, target.host, target.port);

        let mut handle = russh::client::connect(
            self.config.clone(),
            (target.host.as_str(), target.port),
            ClientHandler,
        )
        .await
        .map_err(|err| FlowError::SshConnect {
            host: target.host.clone(),
            port: target.port,
            message: err.to_string(),
        })?;

        let auth_err = |message: String| FlowError::SshAuth {
            host: target.host.clone(),
            username: target.username.clone(),
            message,
        };

        let result = if let Some(path) = &target.key_file {
            let key = russh::keys::load_secret_key(path, target.password.as_deref())
                .map_err(|err| auth_err(format!("failed to load key {path}: {err}")))?;
            let hash = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|err| auth_err(err.to_string()))?
                .flatten();
            handle
                .authenticate_publickey(
                    target.username.clone(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash),
                )
                .await
        } else if let Some(password) = &target.password {
            handle
                .authenticate_password(target.username.clone(), password.clone())
                .await
        } else {
            return Err(auth_err("no password or key file provided".to_string()));
        }
        .map_err(|err| auth_err(err.to_string()))?;

        if !matches!(result, AuthResult::Success) {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(auth_err("server rejected credentials".to_string()));
        }

        debug!("authenticated {}@{}", target.username, target.host);
        Ok(handle)
    }

    async fn exec_capture(
        &self,
        handle: &Handle<ClientHandler>,
        command: &str,
    ) -> Result<(Vec<u8>, Vec<u8>, i32), FlowError> {
        let channel_err = |err: russh::Error| FlowError::SshChannel {
            host: self.target.host.clone(),
            message: err.to_string(),
        };

        let mut chan = handle.channel_open_session().await.map_err(channel_err)?;
        chan.exec(true, command).await.map_err(channel_err)?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code: Option<i32> = None;
        while let Some(msg) = chan.wait().await {
            if handle_capture_message(&msg, &mut out, &mut err, &mut code) {
                break;
            }
        }
        let _ = chan.close().await;

        if code.is_none() {
            warn!("{} closed the channel without an exit status", self.target.host);
        }
        let code = settle_exit_code(code, &out, &err).ok_or_else(|| FlowError::SshChannel {
            host: self.target.host.clone(),
            message: "channel closed without an exit status".to_string(),
        })?;
        Ok((out, err, code))
    }

    async fn run_async(&self, command: &str) -> Result<CommandOutput, FlowError> {
        let handle = self.connect().await?;
        let result = self.exec_capture(&handle, command).await;
        if let Err(err) = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!("ssh disconnect from {} failed: {err}", self.target.host);
        }

        let (out, err, exit_code) = result?;
        Ok(CommandOutput {
            exit_code,
            output: combine_output(&out, &err),
        })
    }
}

impl ExecutionBackend for SshBackend {
    fn run(&self, command_line: &str, work_dir: &Path) -> Result<CommandOutput, FlowError> {
        let command = remote_command(command_line, work_dir);
        info!(host = %self.target.host, "running remote command: {command}");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| FlowError::SshConnect {
                host: self.target.host.clone(),
                port: self.target.port,
                message: format!("failed to start runtime: {err}"),
            })?;
        runtime.block_on(self.run_async(&command))
    }
}

fn remote_command(command_line: &str, work_dir: &Path) -> String {
    let dir = work_dir.to_string_lossy();
    format!("cd {} && {command_line}", shell_words::quote(&dir))
}

fn combine_output(out: &[u8], err: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(out).into_owned();
    if !err.is_empty() {
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(err));
    }
    text
}

fn handle_capture_message(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut Option<i32>,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = Some(*exit_status as i32);
            false
        }
        ChannelMsg::ExitSignal { signal_name, .. } => {
            *code = Some(signal_exit_code(signal_name));
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

/// A command that produced output did run, even if its status was lost.
fn settle_exit_code(code: Option<i32>, out: &[u8], err: &[u8]) -> Option<i32> {
    code.or_else(|| (!out.is_empty() || !err.is_empty()).then_some(UNKNOWN_EXIT_CODE))
}

/// Shell convention, 128 + signal number, as `LocalBackend` reports it.
fn signal_exit_code(signal: &Sig) -> i32 {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        Sig::Custom(_) => return UNKNOWN_EXIT_CODE,
    };
    128 + number
}
