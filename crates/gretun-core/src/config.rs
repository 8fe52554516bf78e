//! Configuration for gretun

use crate::error::ConfigError;
use crate::types::OwnerId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gretun")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the tunnel database
    pub db_path: PathBuf,

    /// SSH connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,

    /// Default MTU for the outer (SIT) tunnel
    pub default_mtu_outer: u16,

    /// Default MTU for the inner (GRE) tunnel
    pub default_mtu_inner: u16,

    /// Idle seconds before an in-progress workflow session is dropped
    pub session_ttl_secs: u64,

    /// Operator granted admin visibility over all tunnels
    pub admin_id: i64,

    /// Operators allowed to use the tool (admin is always allowed)
    pub allowed_ids: Vec<i64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_config_dir().join("tunnels.db"),
            connect_timeout_secs: 30,
            command_timeout_secs: 40,
            default_mtu_outer: 1480,
            default_mtu_inner: 1424,
            session_ttl_secs: 1800,
            admin_id: 0,
            allowed_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    /// SSH connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-command timeout
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Idle TTL for workflow sessions
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// The configured admin owner
    pub fn admin(&self) -> OwnerId {
        OwnerId(self.admin_id)
    }
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: AppConfig = toml::from_str(&content)?;
    tracing::debug!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Save configuration to a file
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    tracing::debug!("Saved configuration to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.default_mtu_outer, 1480);
        assert_eq!(config.default_mtu_inner, 1424);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.command_timeout(), Duration::from_secs(40));
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.admin_id = 42;
        config.allowed_ids = vec![1, 2, 3];

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.admin_id, 42);
        assert_eq!(loaded.allowed_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/gretun.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
