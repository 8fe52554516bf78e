//! gretun-engine: the conversational provisioning engine
//!
//! Drives the multi-stage tunnel workflow: collecting inputs, verifying
//! hosts, rendering and pushing configuration, persisting completed tunnels,
//! probing health, and tearing tunnels down. Frontends feed operator turns
//! into [`Engine::handle_turn`] and render the replies.

pub mod engine;
pub mod health;
pub mod plan;
pub mod render;
pub mod session;
pub mod store;
pub mod teardown;
pub mod workflow;

pub use engine::{Engine, EngineError, Reply, SessionState};
pub use health::HealthStatus;
pub use store::{StoreError, TunnelStore};
pub use workflow::{Input, Stage, Workflow};
