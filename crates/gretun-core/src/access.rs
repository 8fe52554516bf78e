//! Operator access control: a set-membership check against the config.

use crate::config::AppConfig;
use crate::types::OwnerId;

/// What an operator is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Sees and manages every tunnel
    Admin,
    /// Sees and manages only their own tunnels
    User,
}

impl AccessLevel {
    /// Whether this level grants visibility over all owners
    pub fn is_admin(self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

/// Look up an operator's access level; `None` means access denied.
pub fn check_access(config: &AppConfig, operator: OwnerId) -> Option<AccessLevel> {
    if operator.0 == config.admin_id {
        return Some(AccessLevel::Admin);
    }
    if config.allowed_ids.contains(&operator.0) {
        return Some(AccessLevel::User);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            admin_id: 100,
            allowed_ids: vec![200, 300],
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_admin_recognized() {
        assert_eq!(check_access(&config(), OwnerId(100)), Some(AccessLevel::Admin));
    }

    #[test]
    fn test_allowed_user() {
        assert_eq!(check_access(&config(), OwnerId(200)), Some(AccessLevel::User));
    }

    #[test]
    fn test_unknown_denied() {
        assert_eq!(check_access(&config(), OwnerId(999)), None);
    }
}
