//! SSH implementation of the remote executor
//!
//! One authenticated session per command, password auth only. Host keys are
//! accepted on first use: this tool targets freshly rented hosts reached by
//! IP, and the accept-all policy is an explicit, documented property of the
//! design rather than an oversight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use crate::executor::{ExecError, RemoteExecutor};

/// Marker in stderr that classifies a result as an authorization failure
const PERMISSION_DENIED: &str = "Permission denied";

/// Executes commands over one-shot SSH sessions
pub struct SshExecutor {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshExecutor {
    /// Create an executor with the given connect and per-command timeouts
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }

    /// Connect and authenticate, returning an open session handle
    async fn open_session(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Handle<AcceptingClient>, String> {
        let config = Arc::new(Config::default());
        let addr = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:22", host)
        };

        tracing::debug!("Connecting to {}", addr);
        let mut session = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, addr.as_str(), AcceptingClient),
        )
        .await
        .map_err(|_| "connection timed out".to_string())?
        .map_err(|e| format!("connect failed: {}", e))?;

        let authenticated = session
            .authenticate_password(username, password)
            .await
            .map_err(|e| format!("authentication error: {}", e))?;

        if !authenticated {
            return Err("authentication rejected".to_string());
        }

        tracing::debug!("Authenticated to {} as {}", addr, username);
        Ok(session)
    }

    /// Run the command on an open session, capturing stdout and stderr
    /// separately until the channel closes.
    async fn run_command(
        session: &mut Handle<AcceptingClient>,
        command: &str,
    ) -> Result<(String, String), String> {
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| format!("channel open failed: {}", e))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| format!("exec failed: {}", e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // Extended stream 1 is the standard error stream
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => {
                    tracing::trace!("Remote command exited with status {}", exit_status);
                }
                ChannelMsg::Eof | ChannelMsg::Close => {}
                _ => {}
            }
        }

        Ok((
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        ))
    }

    async fn close(session: &mut Handle<AcceptingClient>, host: &str) {
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "done", "en")
            .await
        {
            tracing::debug!("Disconnect from {} returned {}", host, e);
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        host: &str,
        username: &str,
        password: &str,
        command: &str,
    ) -> Result<String, ExecError> {
        tracing::debug!(host, command, "Executing remote command");

        let mut session =
            self.open_session(host, username, password)
                .await
                .map_err(|detail| ExecError::Failed {
                    host: host.to_string(),
                    command: command.to_string(),
                    detail,
                })?;

        let result =
            tokio::time::timeout(self.command_timeout, Self::run_command(&mut session, command))
                .await;

        // The session is closed on every exit path below.
        Self::close(&mut session, host).await;

        let (stdout, stderr) = match result {
            Err(_) => {
                return Err(ExecError::Failed {
                    host: host.to_string(),
                    command: command.to_string(),
                    detail: "command timed out".to_string(),
                })
            }
            Ok(Err(detail)) => {
                return Err(ExecError::Failed {
                    host: host.to_string(),
                    command: command.to_string(),
                    detail,
                })
            }
            Ok(Ok(streams)) => streams,
        };

        classify_output(host, command, stdout, stderr)
    }

    async fn check_login(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ExecError> {
        let mut session =
            self.open_session(host, username, password)
                .await
                .map_err(|detail| ExecError::Failed {
                    host: host.to_string(),
                    command: "<login check>".to_string(),
                    detail,
                })?;
        Self::close(&mut session, host).await;
        Ok(())
    }
}

/// Turn captured streams into the executor result. A permission-denied
/// marker anywhere in stderr classifies the run as an authorization failure.
///
/// Output is returned verbatim; downstream parsers rely on it. Commands that
/// only write to stderr (modprobe noise, crontab chatter) still count as
/// success via the stderr fallback.
fn classify_output(
    host: &str,
    command: &str,
    stdout: String,
    stderr: String,
) -> Result<String, ExecError> {
    if stderr.contains(PERMISSION_DENIED) {
        tracing::warn!(host, command, "Remote command denied");
        return Err(ExecError::Unauthorized {
            host: host.to_string(),
            command: command.to_string(),
        });
    }

    if stdout.is_empty() {
        Ok(stderr)
    } else {
        Ok(stdout)
    }
}

/// SSH client handler that accepts any host key.
///
/// Trust-on-first-use: the provisioning workflow connects to hosts whose
/// keys have never been seen before, so there is nothing to verify against.
struct AcceptingClient;

#[async_trait]
impl client::Handler for AcceptingClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Accepting host key {}", server_public_key.fingerprint());
        Ok(true)
    }
}
