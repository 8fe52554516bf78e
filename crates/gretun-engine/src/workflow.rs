//! Provisioning workflow: a closed stage machine over a draft accumulator
//!
//! Transitions here are pure. Stages whose completion requires remote work
//! hand back a [`PendingAction`]; the engine runs it and decides whether the
//! workflow continues or is abandoned. Stepping back discards exactly the
//! field collected at the stage being returned to, so re-entry always
//! re-collects it.

use thiserror::Error;

use gretun_core::types::{Endpoint, OwnerId, Tunnel, TunnelId};
use gretun_core::validate;

use crate::render::RenderInput;

/// One turn of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Free-form text or a chosen option
    Text(String),
    /// Return to the previous stage
    StepBack,
    /// Abandon the workflow and return to the main menu
    Home,
}

/// The only supported topology
pub const TOPOLOGY_1TO1: &str = "1to1";

/// Token accepted at MTU stages in place of a numeric value
pub const MTU_DEFAULT_TOKEN: &str = "default";

/// Stages in collection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Name,
    Topology,
    HostA,
    UserA,
    PassA,
    HostB,
    UserB,
    PassB,
    OuterA,
    OuterB,
    Psk,
    MtuOuter,
    MtuInner,
    MaintenanceHour,
}

impl Stage {
    fn previous(self) -> Option<Stage> {
        match self {
            Stage::Name => None,
            Stage::Topology => Some(Stage::Name),
            Stage::HostA => Some(Stage::Topology),
            Stage::UserA => Some(Stage::HostA),
            Stage::PassA => Some(Stage::UserA),
            Stage::HostB => Some(Stage::PassA),
            Stage::UserB => Some(Stage::HostB),
            Stage::PassB => Some(Stage::UserB),
            Stage::OuterA => Some(Stage::PassB),
            Stage::OuterB => Some(Stage::OuterA),
            Stage::Psk => Some(Stage::OuterB),
            Stage::MtuOuter => Some(Stage::Psk),
            Stage::MtuInner => Some(Stage::MtuOuter),
            Stage::MaintenanceHour => Some(Stage::MtuInner),
        }
    }
}

/// Remote work owed before the workflow may advance past the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Test the side-A credentials by opening a session
    VerifyHostA,
    /// Test the side-B credentials, then run the prerequisite batch on both
    VerifyHostB,
    /// Push the rendered artifacts to both hosts
    ApplyBoth,
    /// Persist the record, then schedule maintenance on both hosts
    Finalize,
}

/// Result of feeding one text input to the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Input accepted; `action` is the remote work now owed, if any
    Advance { action: Option<PendingAction> },
    /// Input rejected; the stage is unchanged and should be re-prompted
    Reprompt { error: String },
}

/// Fields collected so far. Every field before the current stage is `Some`.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub name: Option<String>,
    pub host_a: Option<String>,
    pub user_a: Option<String>,
    pub pass_a: Option<String>,
    pub host_b: Option<String>,
    pub user_b: Option<String>,
    pub pass_b: Option<String>,
    pub outer_a: Option<String>,
    pub outer_b: Option<String>,
    pub psk: Option<String>,
    pub mtu_outer: Option<u16>,
    pub mtu_inner: Option<u16>,
    pub maintenance_hour: Option<u8>,
}

/// Raised when a draft field the stage ordering guarantees is missing
#[derive(Error, Debug)]
#[error("Workflow field `{0}` missing")]
pub struct IncompleteDraft(pub &'static str);

/// MTU values substituted for the `default` token
#[derive(Debug, Clone, Copy)]
pub struct MtuDefaults {
    pub outer: u16,
    pub inner: u16,
}

/// An in-progress provisioning conversation
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: TunnelId,
    pub owner: OwnerId,
    pub stage: Stage,
    pub draft: Draft,
}

impl Workflow {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            id: TunnelId::generate(),
            owner,
            stage: Stage::Name,
            draft: Draft::default(),
        }
    }

    /// Feed one text input to the current stage
    pub fn apply_text(&mut self, text: &str, defaults: MtuDefaults) -> Transition {
        match self.stage {
            Stage::Name => match validate::validate_name(text) {
                Ok(name) => {
                    self.draft.name = Some(name);
                    self.advance(Stage::Topology, None)
                }
                Err(e) => reprompt(e),
            },
            Stage::Topology => {
                if text.trim() == TOPOLOGY_1TO1 {
                    self.advance(Stage::HostA, None)
                } else {
                    Transition::Reprompt {
                        error: format!("Unknown topology; the only supported choice is `{}`.", TOPOLOGY_1TO1),
                    }
                }
            }
            Stage::HostA => self.take_text(text, "host address", |d, v| d.host_a = Some(v), Stage::UserA, None),
            Stage::UserA => self.take_text(text, "username", |d, v| d.user_a = Some(v), Stage::PassA, None),
            Stage::PassA => self.take_text(
                text,
                "password",
                |d, v| d.pass_a = Some(v),
                Stage::HostB,
                Some(PendingAction::VerifyHostA),
            ),
            Stage::HostB => self.take_text(text, "host address", |d, v| d.host_b = Some(v), Stage::UserB, None),
            Stage::UserB => self.take_text(text, "username", |d, v| d.user_b = Some(v), Stage::PassB, None),
            Stage::PassB => self.take_text(
                text,
                "password",
                |d, v| d.pass_b = Some(v),
                Stage::OuterA,
                Some(PendingAction::VerifyHostB),
            ),
            Stage::OuterA => match validate::validate_ipv4(text) {
                Ok(addr) => {
                    self.draft.outer_a = Some(addr);
                    self.advance(Stage::OuterB, None)
                }
                Err(e) => reprompt(e),
            },
            Stage::OuterB => match validate::validate_ipv4(text) {
                Ok(addr) => {
                    self.draft.outer_b = Some(addr);
                    self.advance(Stage::Psk, None)
                }
                Err(e) => reprompt(e),
            },
            Stage::Psk => match validate::validate_psk(text) {
                Ok(psk) => {
                    self.draft.psk = Some(psk);
                    self.advance(Stage::MtuOuter, None)
                }
                Err(e) => reprompt(e),
            },
            Stage::MtuOuter => match parse_mtu(text, defaults.outer) {
                Ok(mtu) => {
                    self.draft.mtu_outer = Some(mtu);
                    self.advance(Stage::MtuInner, None)
                }
                Err(e) => Transition::Reprompt { error: e },
            },
            Stage::MtuInner => match parse_mtu(text, defaults.inner) {
                Ok(mtu) => {
                    self.draft.mtu_inner = Some(mtu);
                    self.advance(Stage::MaintenanceHour, Some(PendingAction::ApplyBoth))
                }
                Err(e) => Transition::Reprompt { error: e },
            },
            Stage::MaintenanceHour => match validate::validate_hour(text) {
                Ok(hour) => {
                    self.draft.maintenance_hour = Some(hour);
                    Transition::Advance {
                        action: Some(PendingAction::Finalize),
                    }
                }
                Err(e) => reprompt(e),
            },
        }
    }

    /// Step back one stage, clearing the field that stage collects.
    /// `None` means the workflow was at its first stage and is abandoned.
    pub fn step_back(&mut self) -> Option<Stage> {
        let previous = self.stage.previous()?;
        self.clear_field(previous);
        self.stage = previous;
        Some(previous)
    }

    fn clear_field(&mut self, stage: Stage) {
        match stage {
            Stage::Name => self.draft.name = None,
            Stage::Topology => {}
            Stage::HostA => self.draft.host_a = None,
            Stage::UserA => self.draft.user_a = None,
            Stage::PassA => self.draft.pass_a = None,
            Stage::HostB => self.draft.host_b = None,
            Stage::UserB => self.draft.user_b = None,
            Stage::PassB => self.draft.pass_b = None,
            Stage::OuterA => self.draft.outer_a = None,
            Stage::OuterB => self.draft.outer_b = None,
            Stage::Psk => self.draft.psk = None,
            Stage::MtuOuter => self.draft.mtu_outer = None,
            Stage::MtuInner => self.draft.mtu_inner = None,
            Stage::MaintenanceHour => self.draft.maintenance_hour = None,
        }
    }

    fn advance(&mut self, next: Stage, action: Option<PendingAction>) -> Transition {
        self.stage = next;
        Transition::Advance { action }
    }

    fn take_text(
        &mut self,
        text: &str,
        what: &str,
        set: impl FnOnce(&mut Draft, String),
        next: Stage,
        action: Option<PendingAction>,
    ) -> Transition {
        let value = text.trim();
        if value.is_empty() {
            return Transition::Reprompt {
                error: format!("The {} cannot be empty.", what),
            };
        }
        set(&mut self.draft, value.to_string());
        self.advance(next, action)
    }

    /// Prompt text for the current stage
    pub fn prompt(&self, defaults: MtuDefaults) -> String {
        match self.stage {
            Stage::Name => "Enter a name for the new tunnel:".to_string(),
            Stage::Topology => "Choose the tunnel topology:".to_string(),
            Stage::HostA => "Enter the SSH address of host A:".to_string(),
            Stage::UserA => "Enter the SSH username for host A:".to_string(),
            Stage::PassA => "Enter the SSH password for host A:".to_string(),
            Stage::HostB => "Enter the SSH address of host B:".to_string(),
            Stage::UserB => "Enter the SSH username for host B:".to_string(),
            Stage::PassB => "Enter the SSH password for host B:".to_string(),
            Stage::OuterA => "Enter the outer IPv4 address for host A:".to_string(),
            Stage::OuterB => "Enter the outer IPv4 address for host B:".to_string(),
            Stage::Psk => "Enter a pre-shared key for the tunnel:".to_string(),
            Stage::MtuOuter => format!(
                "Enter the outer tunnel MTU (1280-1500), or `{}` for {}:",
                MTU_DEFAULT_TOKEN, defaults.outer
            ),
            Stage::MtuInner => format!(
                "Enter the inner tunnel MTU (1280-1500), or `{}` for {}:",
                MTU_DEFAULT_TOKEN, defaults.inner
            ),
            Stage::MaintenanceHour => {
                "Enter the hour of day (0-23) for the daily maintenance job:".to_string()
            }
        }
    }

    /// Quick-choice options for the current stage, empty for free-form ones
    pub fn options(&self) -> Vec<String> {
        match self.stage {
            Stage::Topology => vec![TOPOLOGY_1TO1.to_string()],
            Stage::MtuOuter | Stage::MtuInner => vec![MTU_DEFAULT_TOKEN.to_string()],
            _ => Vec::new(),
        }
    }

    /// Borrow the collected parameters needed by the renderers.
    /// Available once `MtuInner` has been passed.
    pub fn render_input(&self) -> Result<RenderInput<'_>, IncompleteDraft> {
        Ok(RenderInput {
            outer_a: self.draft.outer_a.as_deref().ok_or(IncompleteDraft("outer_a"))?,
            outer_b: self.draft.outer_b.as_deref().ok_or(IncompleteDraft("outer_b"))?,
            psk: self.draft.psk.as_deref().ok_or(IncompleteDraft("psk"))?,
            mtu_outer: self.draft.mtu_outer.ok_or(IncompleteDraft("mtu_outer"))?,
            mtu_inner: self.draft.mtu_inner.ok_or(IncompleteDraft("mtu_inner"))?,
        })
    }

    /// Credentials for one side, available once that side's password stage
    /// has been passed.
    pub fn credentials(&self, side_a: bool) -> Result<(&str, &str, &str), IncompleteDraft> {
        if side_a {
            Ok((
                self.draft.host_a.as_deref().ok_or(IncompleteDraft("host_a"))?,
                self.draft.user_a.as_deref().ok_or(IncompleteDraft("user_a"))?,
                self.draft.pass_a.as_deref().ok_or(IncompleteDraft("pass_a"))?,
            ))
        } else {
            Ok((
                self.draft.host_b.as_deref().ok_or(IncompleteDraft("host_b"))?,
                self.draft.user_b.as_deref().ok_or(IncompleteDraft("user_b"))?,
                self.draft.pass_b.as_deref().ok_or(IncompleteDraft("pass_b"))?,
            ))
        }
    }

    /// Convert the completed draft into a persistent record
    pub fn into_tunnel(self, created_at: i64) -> Result<Tunnel, IncompleteDraft> {
        let draft = self.draft;
        Ok(Tunnel {
            id: self.id,
            name: draft.name.ok_or(IncompleteDraft("name"))?,
            owner: self.owner,
            a: Endpoint {
                host: draft.host_a.ok_or(IncompleteDraft("host_a"))?,
                username: draft.user_a.ok_or(IncompleteDraft("user_a"))?,
                password: draft.pass_a.ok_or(IncompleteDraft("pass_a"))?,
                outer_addr: draft.outer_a.ok_or(IncompleteDraft("outer_a"))?,
            },
            b: Endpoint {
                host: draft.host_b.ok_or(IncompleteDraft("host_b"))?,
                username: draft.user_b.ok_or(IncompleteDraft("user_b"))?,
                password: draft.pass_b.ok_or(IncompleteDraft("pass_b"))?,
                outer_addr: draft.outer_b.ok_or(IncompleteDraft("outer_b"))?,
            },
            psk: draft.psk.ok_or(IncompleteDraft("psk"))?,
            mtu_outer: draft.mtu_outer.ok_or(IncompleteDraft("mtu_outer"))?,
            mtu_inner: draft.mtu_inner.ok_or(IncompleteDraft("mtu_inner"))?,
            maintenance_hour: draft.maintenance_hour.ok_or(IncompleteDraft("maintenance_hour"))?,
            created_at,
        })
    }
}

fn parse_mtu(text: &str, default: u16) -> Result<u16, String> {
    if text.trim() == MTU_DEFAULT_TOKEN {
        return Ok(default);
    }
    validate::validate_mtu(text).map_err(|e| e.to_string())
}

fn reprompt(e: impl std::fmt::Display) -> Transition {
    Transition::Reprompt {
        error: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: MtuDefaults = MtuDefaults {
        outer: 1480,
        inner: 1424,
    };

    fn advance(w: &mut Workflow, text: &str) -> Option<PendingAction> {
        match w.apply_text(text, DEFAULTS) {
            Transition::Advance { action } => action,
            Transition::Reprompt { error } => panic!("unexpected reprompt: {}", error),
        }
    }

    fn drive_to_outer_a(w: &mut Workflow) {
        assert_eq!(advance(w, "t1"), None);
        assert_eq!(advance(w, "1to1"), None);
        assert_eq!(advance(w, "10.0.0.1"), None);
        assert_eq!(advance(w, "root"), None);
        assert_eq!(advance(w, "pw-a"), Some(PendingAction::VerifyHostA));
        assert_eq!(advance(w, "10.0.0.2"), None);
        assert_eq!(advance(w, "root"), None);
        assert_eq!(advance(w, "pw-b"), Some(PendingAction::VerifyHostB));
        assert_eq!(w.stage, Stage::OuterA);
    }

    #[test]
    fn test_full_advance_sequence() {
        let mut w = Workflow::new(OwnerId(1));
        drive_to_outer_a(&mut w);

        assert_eq!(advance(&mut w, "203.0.113.1"), None);
        assert_eq!(advance(&mut w, "203.0.113.2"), None);
        assert_eq!(advance(&mut w, "secret123"), None);
        assert_eq!(advance(&mut w, "default"), None);
        assert_eq!(advance(&mut w, "default"), Some(PendingAction::ApplyBoth));
        assert_eq!(w.stage, Stage::MaintenanceHour);
        assert_eq!(advance(&mut w, "3"), Some(PendingAction::Finalize));

        let tunnel = w.into_tunnel(1_700_000_000).unwrap();
        assert_eq!(tunnel.name, "t1");
        assert_eq!(tunnel.mtu_outer, 1480);
        assert_eq!(tunnel.mtu_inner, 1424);
        assert_eq!(tunnel.maintenance_hour, 3);
        assert_eq!(tunnel.a.outer_addr, "203.0.113.1");
        assert_eq!(tunnel.b.password, "pw-b");
    }

    #[test]
    fn test_invalid_input_keeps_stage() {
        let mut w = Workflow::new(OwnerId(1));
        drive_to_outer_a(&mut w);

        assert!(matches!(
            w.apply_text("256.1.1.1", DEFAULTS),
            Transition::Reprompt { .. }
        ));
        assert_eq!(w.stage, Stage::OuterA);
        assert!(w.draft.outer_a.is_none());
    }

    #[test]
    fn test_manual_mtu_accepted() {
        let mut w = Workflow::new(OwnerId(1));
        drive_to_outer_a(&mut w);
        advance(&mut w, "203.0.113.1");
        advance(&mut w, "203.0.113.2");
        advance(&mut w, "secret123");

        assert!(matches!(
            w.apply_text("1501", DEFAULTS),
            Transition::Reprompt { .. }
        ));
        advance(&mut w, "1400");
        assert_eq!(w.draft.mtu_outer, Some(1400));
    }

    #[test]
    fn test_topology_rejects_unknown() {
        let mut w = Workflow::new(OwnerId(1));
        advance(&mut w, "t1");
        assert!(matches!(
            w.apply_text("mesh", DEFAULTS),
            Transition::Reprompt { .. }
        ));
        assert_eq!(w.stage, Stage::Topology);
        assert_eq!(w.options(), vec!["1to1".to_string()]);
    }

    #[test]
    fn test_step_back_clears_field() {
        let mut w = Workflow::new(OwnerId(1));
        advance(&mut w, "t1");
        advance(&mut w, "1to1");
        advance(&mut w, "10.0.0.1");
        assert_eq!(w.stage, Stage::UserA);

        assert_eq!(w.step_back(), Some(Stage::HostA));
        assert!(w.draft.host_a.is_none());

        // Re-entering moves forward again
        advance(&mut w, "10.9.9.9");
        assert_eq!(w.draft.host_a.as_deref(), Some("10.9.9.9"));
        assert_eq!(w.stage, Stage::UserA);
    }

    #[test]
    fn test_step_back_from_first_stage_abandons() {
        let mut w = Workflow::new(OwnerId(1));
        assert_eq!(w.step_back(), None);
    }

    #[test]
    fn test_render_input_after_mtu_stages() {
        let mut w = Workflow::new(OwnerId(1));
        assert!(w.render_input().is_err());

        drive_to_outer_a(&mut w);
        advance(&mut w, "203.0.113.1");
        advance(&mut w, "203.0.113.2");
        advance(&mut w, "secret123");
        advance(&mut w, "default");
        advance(&mut w, "1300");

        let input = w.render_input().unwrap();
        assert_eq!(input.outer_a, "203.0.113.1");
        assert_eq!(input.mtu_outer, 1480);
        assert_eq!(input.mtu_inner, 1300);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let mut w = Workflow::new(OwnerId(1));
        advance(&mut w, "  t1  ");
        assert_eq!(w.draft.name.as_deref(), Some("t1"));
    }
}
