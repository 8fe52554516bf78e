//! gretun-remote: One-shot SSH command execution
//!
//! Every remote operation gretun performs (connectivity tests, provisioning
//! batches, health probes, teardown) goes through the [`RemoteExecutor`]
//! trait. The production implementation opens a fresh password-authenticated
//! SSH session per command; tests substitute a scripted fake.

pub mod executor;
pub mod ssh;

pub use executor::{ExecError, RemoteExecutor};
pub use ssh::SshExecutor;
