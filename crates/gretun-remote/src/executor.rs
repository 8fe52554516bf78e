//! Remote command execution contract

use async_trait::async_trait;
use thiserror::Error;

/// Classified remote execution failures.
///
/// Both variants embed the host and command so every surfaced failure can be
/// diagnosed without extra context. These are never panics: any connect,
/// auth, timeout, or channel fault is converted into `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The command ran but the remote side refused it (permission denied)
    #[error("Authorization denied on {host} running `{command}`")]
    Unauthorized { host: String, command: String },

    /// Connect, auth, timeout, or transport failure
    #[error("Remote execution failed on {host} running `{command}`: {detail}")]
    Failed {
        host: String,
        command: String,
        detail: String,
    },
}

impl ExecError {
    /// The host the failing operation targeted
    pub fn host(&self) -> &str {
        match self {
            ExecError::Unauthorized { host, .. } => host,
            ExecError::Failed { host, .. } => host,
        }
    }
}

/// Executes single commands against remote hosts over an authenticated
/// channel.
///
/// Implementations open one fresh session per call; there is no pooling or
/// reuse. Output comes back verbatim, without escaping or truncation, so
/// callers can parse it.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run one command on `host`, returning its output or a classified
    /// failure. On success the standard output is returned if non-empty,
    /// otherwise the standard error stream.
    async fn execute(
        &self,
        host: &str,
        username: &str,
        password: &str,
        command: &str,
    ) -> Result<String, ExecError>;

    /// Open and immediately close an authenticated session, verifying the
    /// host/credential triple without running anything.
    async fn check_login(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ExecError>;
}
