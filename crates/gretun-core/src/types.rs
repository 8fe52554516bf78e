//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a tunnel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelId(pub String);

impl TunnelId {
    /// Generate a fresh tunnel ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TunnelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TunnelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the operator who owns a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of the tunnel a host plays.
///
/// Side A is the endpoint entered first in the workflow ("local"); side B
/// is its peer. The fixed inner addressing is disjoint per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    A,
    B,
}

impl Role {
    /// The opposite endpoint role
    pub fn peer(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Fixed inner IPv6 address assigned on the outer (SIT) interface.
    ///
    /// These constants are shared by every tunnel this tool provisions,
    /// regardless of operator. Two workflows running at the same time
    /// against overlapping hosts will silently collide on them.
    pub fn inner_v6(self) -> &'static str {
        match self {
            Role::A => "2002:504b:d769::2",
            Role::B => "2002:504b:d769::1",
        }
    }

    /// Fixed inner IPv4 address (/30) assigned on the GRE interface.
    /// Same sharing caveat as `inner_v6`.
    pub fn inner_v4(self) -> &'static str {
        match self {
            Role::A => "172.20.40.1",
            Role::B => "172.20.40.2",
        }
    }

    /// Name of the outer address-family-translating (SIT) interface
    pub fn sit_interface(self) -> &'static str {
        match self {
            Role::A => "sit64a",
            Role::B => "sit64b",
        }
    }

    /// Name of the inner GRE-over-IPv6 interface
    pub fn gre_interface(self) -> &'static str {
        match self {
            Role::A => "gre6a",
            Role::B => "gre6b",
        }
    }

    /// Identity used in the security-association config and secrets file
    pub fn ipsec_id(self) -> &'static str {
        match self {
            Role::A => "@a",
            Role::B => "@b",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => write!(f, "a"),
            Role::B => write!(f, "b"),
        }
    }
}

/// One end of a tunnel: how to reach the host, and its outer address.
///
/// Credentials are held and persisted as entered; there is no encryption
/// at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// SSH host address (IPv4)
    pub host: String,
    /// SSH login username
    pub username: String,
    /// SSH login password, cleartext
    pub password: String,
    /// Outer IPv4 address used by the encapsulating tunnel
    pub outer_addr: String,
}

/// A fully provisioned tunnel definition.
///
/// Created only at the final successful stage of the workflow and never
/// updated afterwards; removed only by a fully successful two-host teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub id: TunnelId,
    /// Operator-chosen name, intended unique per owner but not enforced
    pub name: String,
    pub owner: OwnerId,
    /// Side A endpoint
    pub a: Endpoint,
    /// Side B endpoint
    pub b: Endpoint,
    /// Pre-shared key for the security association, cleartext
    pub psk: String,
    /// MTU of the outer (SIT) interface
    pub mtu_outer: u16,
    /// MTU of the inner (GRE) interface
    pub mtu_inner: u16,
    /// Hour of day (0-23) for the recurring recycle job
    pub maintenance_hour: u8,
    /// Unix timestamp of creation
    pub created_at: i64,
}

impl Tunnel {
    /// The endpoint playing the given role
    pub fn endpoint(&self, role: Role) -> &Endpoint {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }
}
