//! Configuration for the coordinator daemon
//!
//! Loaded once from a TOML file at startup. Account entries are validated
//! into the immutable [`crate::registry::AccountRegistry`]; everything else
//! tunes the daemon itself (IPC port, wait bounds, operator access list).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the coordinator daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// IPC port for front-end communication (localhost only)
    pub ipc_port: u16,

    /// How long a start/submit call waits for the handshake to resolve
    /// before returning a provisional `Pending` result
    #[serde(with = "duration_secs")]
    pub grace_period: Duration,

    /// How long `stop` waits for a graceful logout before degrading to
    /// forced release
    #[serde(with = "duration_secs")]
    pub stop_timeout: Duration,

    /// Requester IDs allowed to issue start/submit commands.
    /// Empty means no restriction.
    #[serde(default)]
    pub allowed_requesters: Vec<i64>,

    /// Account entries, in the order they should be listed
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ipc_port: 48650,
            grace_period: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            allowed_requesters: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    /// Get the IPC address (localhost:port)
    pub fn ipc_address(&self) -> String {
        format!("127.0.0.1:{}", self.ipc_port)
    }
}

/// One `[[accounts]]` section as written in the config file.
///
/// Fields are optional here so that validation can report which field is
/// missing instead of a generic deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Account identifier, unique within the file
    pub id: String,

    /// Login name at the external service
    pub identity: Option<String>,

    /// Password
    pub secret: Option<String>,

    /// Activity IDs to declare once the account is signed in
    #[serde(default)]
    pub activities: Vec<i64>,
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vigil")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

// Helper module for Duration serialization as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
