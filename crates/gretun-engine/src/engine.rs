//! Turn-based engine tying sessions, workflow, store, and remote execution
//! together
//!
//! One `Engine` instance carries everything a turn needs, so handlers take
//! no global state. A turn is: resolve access, take the session state, feed
//! the input to whatever the session is doing, run any remote work it owes,
//! store the new state, and reply.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use gretun_core::access::{check_access, AccessLevel};
use gretun_core::config::AppConfig;
use gretun_core::types::{OwnerId, Role, Tunnel};
use gretun_remote::{ExecError, RemoteExecutor};

use crate::health::{self, HealthStatus};
use crate::plan;
use crate::session::SessionRegistry;
use crate::store::{StoreError, TunnelStore};
use crate::teardown;
use crate::workflow::{
    IncompleteDraft, Input, MtuDefaults, PendingAction, Transition, Workflow,
};

const MENU_CREATE: &str = "create";
const MENU_STATUS: &str = "status";
const MENU_DELETE: &str = "delete";

/// What the engine sends back after a turn. Serializable so non-terminal
/// frontends can pass it along unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Quick choices the frontend may render as buttons; free-form input is
    /// always also accepted
    pub options: Vec<String>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }
}

/// Where a session currently is in the conversation
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Menu,
    Provisioning(Workflow),
    SelectStatus,
    SelectDelete,
}

/// Failures a turn cannot turn into a conversational reply
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Incomplete(#[from] IncompleteDraft),
}

/// Shared application context for every conversation
pub struct Engine {
    config: AppConfig,
    store: TunnelStore,
    executor: Arc<dyn RemoteExecutor>,
    sessions: SessionRegistry<SessionState>,
}

impl Engine {
    pub fn new(config: AppConfig, store: TunnelStore, executor: Arc<dyn RemoteExecutor>) -> Self {
        let sessions = SessionRegistry::new(config.session_ttl());
        Self {
            config,
            store,
            executor,
            sessions,
        }
    }

    /// Process one operator turn
    pub async fn handle_turn(
        &self,
        session_id: &str,
        operator: OwnerId,
        input: Input,
    ) -> Result<Reply, EngineError> {
        let Some(access) = check_access(&self.config, operator) else {
            warn!(%operator, "Access denied");
            return Ok(Reply::text("You are not authorized to use this tool."));
        };

        self.sessions.sweep_expired();
        let state = self.sessions.take(session_id);

        let (next, reply) = self.dispatch(state, operator, access, input).await?;
        self.sessions.put(session_id, next);
        Ok(reply)
    }

    async fn dispatch(
        &self,
        state: SessionState,
        operator: OwnerId,
        access: AccessLevel,
        input: Input,
    ) -> Result<(SessionState, Reply), EngineError> {
        match state {
            SessionState::Menu => self.on_menu(operator, access, input).await,
            SessionState::SelectStatus => self.on_select_status(operator, access, input).await,
            SessionState::SelectDelete => self.on_select_delete(operator, access, input).await,
            SessionState::Provisioning(workflow) => {
                self.on_provisioning(workflow, input).await
            }
        }
    }

    fn menu_reply(&self, prefix: &str) -> Reply {
        let text = if prefix.is_empty() {
            "What would you like to do?".to_string()
        } else {
            format!("{}\n\nWhat would you like to do?", prefix)
        };
        Reply {
            text,
            options: vec![
                MENU_CREATE.to_string(),
                MENU_STATUS.to_string(),
                MENU_DELETE.to_string(),
            ],
        }
    }

    fn mtu_defaults(&self) -> MtuDefaults {
        MtuDefaults {
            outer: self.config.default_mtu_outer,
            inner: self.config.default_mtu_inner,
        }
    }

    fn prompt_reply(&self, workflow: &Workflow, prefix: &str) -> Reply {
        let prompt = workflow.prompt(self.mtu_defaults());
        let text = if prefix.is_empty() {
            prompt
        } else {
            format!("{}\n\n{}", prefix, prompt)
        };
        Reply {
            text,
            options: workflow.options(),
        }
    }

    async fn on_menu(
        &self,
        operator: OwnerId,
        access: AccessLevel,
        input: Input,
    ) -> Result<(SessionState, Reply), EngineError> {
        let Input::Text(text) = input else {
            return Ok((SessionState::Menu, self.menu_reply("")));
        };

        match text.trim() {
            MENU_CREATE => {
                let workflow = Workflow::new(operator);
                info!(%operator, tunnel_id = %workflow.id, "Provisioning workflow started");
                let reply = self.prompt_reply(&workflow, "");
                Ok((SessionState::Provisioning(workflow), reply))
            }
            MENU_STATUS => self.select_reply(operator, access, SessionState::SelectStatus),
            MENU_DELETE => self.select_reply(operator, access, SessionState::SelectDelete),
            _ => Ok((
                SessionState::Menu,
                self.menu_reply("Please choose one of the options."),
            )),
        }
    }

    fn select_reply(
        &self,
        operator: OwnerId,
        access: AccessLevel,
        next: SessionState,
    ) -> Result<(SessionState, Reply), EngineError> {
        let tunnels = self.store.list(operator, access)?;
        if tunnels.is_empty() {
            return Ok((SessionState::Menu, self.menu_reply("No tunnels found.")));
        }
        let names: Vec<String> = tunnels.into_iter().map(|t| t.name).collect();
        Ok((
            next,
            Reply {
                text: "Choose a tunnel:".to_string(),
                options: names,
            },
        ))
    }

    async fn on_select_status(
        &self,
        operator: OwnerId,
        access: AccessLevel,
        input: Input,
    ) -> Result<(SessionState, Reply), EngineError> {
        let Input::Text(name) = input else {
            return Ok((SessionState::Menu, self.menu_reply("")));
        };
        let name = name.trim();

        let Some(tunnel) = self.store.get_by_name(name, operator, access)? else {
            return Ok((
                SessionState::Menu,
                self.menu_reply(&format!("No tunnel named `{}` found.", name)),
            ));
        };

        let report = self.health_report(&tunnel).await;
        Ok((SessionState::Menu, self.menu_reply(&report)))
    }

    /// Probe both sides at once and format one report
    async fn health_report(&self, tunnel: &Tunnel) -> String {
        let (status_a, status_b) = tokio::join!(
            health::check_endpoint(self.executor.as_ref(), &tunnel.a, Role::A),
            health::check_endpoint(self.executor.as_ref(), &tunnel.b, Role::B),
        );

        format!(
            "Tunnel `{}`\nside A ({}): {}\nside B ({}): {}",
            tunnel.name,
            tunnel.a.host,
            format_status(&status_a),
            tunnel.b.host,
            format_status(&status_b),
        )
    }

    async fn on_select_delete(
        &self,
        operator: OwnerId,
        access: AccessLevel,
        input: Input,
    ) -> Result<(SessionState, Reply), EngineError> {
        let Input::Text(name) = input else {
            return Ok((SessionState::Menu, self.menu_reply("")));
        };
        let name = name.trim();

        let Some(tunnel) = self.store.get_by_name(name, operator, access)? else {
            return Ok((
                SessionState::Menu,
                self.menu_reply(&format!("No tunnel named `{}` found.", name)),
            ));
        };

        let reply = match teardown::teardown(self.executor.as_ref(), &self.store, &tunnel).await {
            Ok(()) => self.menu_reply(&format!(
                "Tunnel `{}` removed from both hosts.",
                tunnel.name
            )),
            Err(e) => self.menu_reply(&format!(
                "Teardown of `{}` failed: {}. The record was kept; run delete again once the host is reachable.",
                tunnel.name, e
            )),
        };
        Ok((SessionState::Menu, reply))
    }

    async fn on_provisioning(
        &self,
        mut workflow: Workflow,
        input: Input,
    ) -> Result<(SessionState, Reply), EngineError> {
        let text = match input {
            Input::Home => {
                info!(tunnel_id = %workflow.id, "Workflow abandoned");
                return Ok((
                    SessionState::Menu,
                    self.menu_reply("Returned to the main menu."),
                ));
            }
            Input::StepBack => {
                return match workflow.step_back() {
                    Some(_) => {
                        let reply = self.prompt_reply(&workflow, "");
                        Ok((SessionState::Provisioning(workflow), reply))
                    }
                    None => Ok((
                        SessionState::Menu,
                        self.menu_reply("Workflow abandoned."),
                    )),
                };
            }
            Input::Text(text) => text,
        };

        match workflow.apply_text(&text, self.mtu_defaults()) {
            Transition::Reprompt { error } => {
                let reply = self.prompt_reply(&workflow, &error);
                Ok((SessionState::Provisioning(workflow), reply))
            }
            Transition::Advance { action: None } => {
                let reply = self.prompt_reply(&workflow, "");
                Ok((SessionState::Provisioning(workflow), reply))
            }
            Transition::Advance {
                action: Some(action),
            } => self.run_action(workflow, action).await,
        }
    }

    /// Run the remote work a stage owes. Any failure abandons the workflow;
    /// partial remote changes stay in place.
    async fn run_action(
        &self,
        workflow: Workflow,
        action: PendingAction,
    ) -> Result<(SessionState, Reply), EngineError> {
        match action {
            PendingAction::VerifyHostA => {
                let (host, user, pass) = workflow.credentials(true)?;
                match self.executor.check_login(host, user, pass).await {
                    Ok(()) => {
                        let reply = self.prompt_reply(&workflow, "Connected to host A.");
                        Ok((SessionState::Provisioning(workflow), reply))
                    }
                    Err(e) => Ok(self.abandon(&workflow, e)),
                }
            }
            PendingAction::VerifyHostB => {
                let (host_b, user_b, pass_b) = workflow.credentials(false)?;
                if let Err(e) = self.executor.check_login(host_b, user_b, pass_b).await {
                    return Ok(self.abandon(&workflow, e));
                }

                // Prerequisites go on once per host, all of A before any of B
                let (host_a, user_a, pass_a) = workflow.credentials(true)?;
                let commands = plan::prereq_commands();
                if let Err(e) = self.run_batch(host_a, user_a, pass_a, &commands).await {
                    return Ok(self.abandon(&workflow, e));
                }
                if let Err(e) = self.run_batch(host_b, user_b, pass_b, &commands).await {
                    return Ok(self.abandon(&workflow, e));
                }

                let reply =
                    self.prompt_reply(&workflow, "Both hosts verified and prerequisites installed.");
                Ok((SessionState::Provisioning(workflow), reply))
            }
            PendingAction::ApplyBoth => {
                let input = workflow.render_input()?;
                let commands_a = plan::apply_commands(&input, Role::A);
                let commands_b = plan::apply_commands(&input, Role::B);

                let (host_a, user_a, pass_a) = workflow.credentials(true)?;
                if let Err(e) = self.run_batch(host_a, user_a, pass_a, &commands_a).await {
                    return Ok(self.abandon(&workflow, e));
                }
                let (host_b, user_b, pass_b) = workflow.credentials(false)?;
                if let Err(e) = self.run_batch(host_b, user_b, pass_b, &commands_b).await {
                    return Ok(self.abandon(&workflow, e));
                }

                let reply =
                    self.prompt_reply(&workflow, "Tunnel configuration applied on both hosts.");
                Ok((SessionState::Provisioning(workflow), reply))
            }
            PendingAction::Finalize => self.finalize(workflow).await,
        }
    }

    fn abandon(&self, workflow: &Workflow, error: ExecError) -> (SessionState, Reply) {
        warn!(tunnel_id = %workflow.id, %error, "Provisioning failed");
        (
            SessionState::Menu,
            self.menu_reply(&format!(
                "{}\n\nThe workflow was abandoned. Changes already made on the hosts were left in place.",
                error
            )),
        )
    }

    /// Persist the record, then install the cron schedule on both hosts.
    /// The record is written first; a scheduling failure leaves it in place
    /// so status and delete still work.
    async fn finalize(&self, workflow: Workflow) -> Result<(SessionState, Reply), EngineError> {
        let hour = workflow
            .draft
            .maintenance_hour
            .ok_or(IncompleteDraft("maintenance_hour"))?;

        let tunnel = workflow.into_tunnel(chrono::Utc::now().timestamp())?;
        self.store.insert(&tunnel)?;
        info!(tunnel_id = %tunnel.id, name = %tunnel.name, "Tunnel persisted");

        let command = plan::schedule_command(hour);
        for role in [Role::A, Role::B] {
            let ep = tunnel.endpoint(role);
            if let Err(e) = self
                .executor
                .execute(&ep.host, &ep.username, &ep.password, &command)
                .await
            {
                warn!(tunnel_id = %tunnel.id, %e, "Scheduling failed");
                return Ok((
                    SessionState::Menu,
                    self.menu_reply(&format!(
                        "Tunnel `{}` was saved, but scheduling the maintenance job failed: {}",
                        tunnel.name, e
                    )),
                ));
            }
        }

        Ok((
            SessionState::Menu,
            self.menu_reply(&format!(
                "Tunnel `{}` is provisioned. {} ({}) <-> {} ({})",
                tunnel.name,
                tunnel.a.host,
                Role::A.inner_v4(),
                tunnel.b.host,
                Role::B.inner_v4(),
            )),
        ))
    }

    async fn run_batch(
        &self,
        host: &str,
        user: &str,
        pass: &str,
        commands: &[String],
    ) -> Result<(), ExecError> {
        for command in commands {
            self.executor.execute(host, user, pass, command).await?;
        }
        Ok(())
    }
}

fn format_status(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Connected { rtt_ms } => format!("connected, avg rtt {:.2} ms", rtt_ms),
        HealthStatus::Disconnected { detail } => format!("disconnected ({})", detail),
        HealthStatus::Error { detail } => format!("check failed ({})", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct OkExecutor;

    #[async_trait]
    impl RemoteExecutor for OkExecutor {
        async fn execute(
            &self,
            _host: &str,
            _username: &str,
            _password: &str,
            _command: &str,
        ) -> Result<String, ExecError> {
            Ok("ok".to_string())
        }

        async fn check_login(
            &self,
            _host: &str,
            _username: &str,
            _password: &str,
        ) -> Result<(), ExecError> {
            Ok(())
        }
    }

    fn engine() -> Engine {
        let config = AppConfig {
            admin_id: 1,
            allowed_ids: vec![2],
            ..AppConfig::default()
        };
        Engine::new(config, TunnelStore::open_memory().unwrap(), Arc::new(OkExecutor))
    }

    #[tokio::test]
    async fn test_unknown_operator_denied() {
        let engine = engine();
        let reply = engine
            .handle_turn("s1", OwnerId(999), Input::Text("create".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("not authorized"));
        assert!(reply.options.is_empty());
    }

    #[tokio::test]
    async fn test_menu_offers_operations() {
        let engine = engine();
        let reply = engine
            .handle_turn("s1", OwnerId(1), Input::Home)
            .await
            .unwrap();
        assert_eq!(reply.options, vec!["create", "status", "delete"]);
    }

    #[tokio::test]
    async fn test_invalid_menu_choice_reprompts() {
        let engine = engine();
        let reply = engine
            .handle_turn("s1", OwnerId(1), Input::Text("explode".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("Please choose one of the options."));
        assert_eq!(reply.options, vec!["create", "status", "delete"]);
    }

    #[tokio::test]
    async fn test_create_starts_workflow() {
        let engine = engine();
        let reply = engine
            .handle_turn("s1", OwnerId(2), Input::Text("create".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("Enter a name"));

        // The session remembers the workflow across turns
        let reply = engine
            .handle_turn("s1", OwnerId(2), Input::Text("t1".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("topology"));
        assert_eq!(reply.options, vec!["1to1"]);
    }

    #[tokio::test]
    async fn test_home_abandons_workflow() {
        let engine = engine();
        engine
            .handle_turn("s1", OwnerId(1), Input::Text("create".into()))
            .await
            .unwrap();
        let reply = engine
            .handle_turn("s1", OwnerId(1), Input::Home)
            .await
            .unwrap();
        assert!(reply.text.contains("Returned to the main menu."));

        // Back at the menu, "status" is a menu choice again
        let reply = engine
            .handle_turn("s1", OwnerId(1), Input::Text("status".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("No tunnels found."));
    }

    #[tokio::test]
    async fn test_status_with_empty_store() {
        let engine = engine();
        let reply = engine
            .handle_turn("s1", OwnerId(1), Input::Text("status".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("No tunnels found."));
        assert_eq!(reply.options, vec!["create", "status", "delete"]);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let engine = engine();
        engine
            .handle_turn("s1", OwnerId(1), Input::Text("create".into()))
            .await
            .unwrap();

        // A different session is still at the menu
        let reply = engine
            .handle_turn("s2", OwnerId(2), Input::Text("status".into()))
            .await
            .unwrap();
        assert!(reply.text.contains("No tunnels found."));
    }
}
