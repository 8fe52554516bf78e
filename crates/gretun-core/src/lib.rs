//! gretun-core: Shared types, validation, and configuration for gretun
//!
//! This crate provides the domain types (tunnels, endpoints, fixed
//! addressing), the pure input validators, operator access control, and
//! configuration structures used by the engine and CLI.

pub mod access;
pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ValidationError};
pub use types::{Endpoint, OwnerId, Role, Tunnel, TunnelId};
