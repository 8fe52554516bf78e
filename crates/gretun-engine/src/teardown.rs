//! Ordered removal of a provisioned tunnel
//!
//! Side A is cleaned before side B, and the stored record is deleted only
//! after both hosts finished their cleanup sequence. A failure partway
//! leaves remote state and the record in place; rerunning is safe because
//! every cleanup step tolerates already-removed artifacts.

use thiserror::Error;
use tracing::{info, warn};

use gretun_core::types::{Endpoint, Role, Tunnel};
use gretun_remote::{ExecError, RemoteExecutor};

use crate::plan;
use crate::store::{StoreError, TunnelStore};

#[derive(Error, Debug)]
pub enum TeardownError {
    #[error(transparent)]
    Remote(#[from] ExecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Remove the tunnel from both hosts and then from the store
pub async fn teardown(
    executor: &dyn RemoteExecutor,
    store: &TunnelStore,
    tunnel: &Tunnel,
) -> Result<(), TeardownError> {
    for role in [Role::A, Role::B] {
        cleanup_host(executor, tunnel.endpoint(role), role).await?;
    }

    store.delete(&tunnel.id)?;
    info!("Tunnel {} ({}) removed", tunnel.name, tunnel.id);
    Ok(())
}

async fn cleanup_host(
    executor: &dyn RemoteExecutor,
    endpoint: &Endpoint,
    role: Role,
) -> Result<(), ExecError> {
    info!(host = %endpoint.host, %role, "Cleaning up tunnel artifacts");
    for command in plan::cleanup_commands(role) {
        if let Err(e) = executor
            .execute(&endpoint.host, &endpoint.username, &endpoint.password, &command)
            .await
        {
            warn!(host = %endpoint.host, command, "Cleanup step failed");
            return Err(e);
        }
    }
    Ok(())
}
