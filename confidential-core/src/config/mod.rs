//! Node configuration
//!
//! Defaults, a TOML file, and `CONFIDENTIAL_*` environment overrides.

use crate::core_flows::DisclosureMode;
use crate::core_session::SessionSettings;
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local identity
    pub node: NodeConfig,

    /// Session behaviour
    pub protocol: ProtocolConfig,

    /// Mapping sync
    pub sync: SyncConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Local identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name of the local well-known party
    pub name: String,
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long a protocol run waits for the counterparty's next message
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Duration,

    /// Frames buffered per session direction
    pub session_buffer: usize,
}

/// Mapping sync, both sides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Which resolved mappings are returned to requesters
    pub disclosure: DisclosureMode,

    /// Have each claimed owner prove a synced key before it is registered
    pub verify_mappings: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let session = SessionSettings::default();
        Self {
            receive_timeout: session.receive_timeout,
            session_buffer: session.buffer,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            disclosure: DisclosureMode::default(),
            verify_mappings: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: CONFIDENTIAL_<SECTION>_<KEY>
    /// Example: CONFIDENTIAL_SYNC_DISCLOSURE=own-keys
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // Node config
        if let Some(name) = var("CONFIDENTIAL_NODE_NAME") {
            self.node.name = name;
        }

        // Protocol config
        if let Some(secs) = var("CONFIDENTIAL_PROTOCOL_RECEIVE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid receive timeout: {}", e)))?;
            self.protocol.receive_timeout = Duration::from_secs(secs);
        }
        if let Some(buffer) = var("CONFIDENTIAL_PROTOCOL_SESSION_BUFFER") {
            self.protocol.session_buffer = buffer
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid session buffer: {}", e)))?;
        }

        // Sync config
        if let Some(mode) = var("CONFIDENTIAL_SYNC_DISCLOSURE") {
            self.sync.disclosure = mode.parse().map_err(ConfigError::InvalidValue)?;
        }
        if let Some(verify) = var("CONFIDENTIAL_SYNC_VERIFY_MAPPINGS") {
            self.sync.verify_mappings = verify
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid verify flag: {}", e)))?;
        }

        // Logging config
        if let Some(level) = var("CONFIDENTIAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("CONFIDENTIAL_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "node name must not be empty".to_string(),
            ));
        }

        if self.protocol.receive_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "receive_timeout must be greater than 0".to_string(),
            ));
        }

        if self.protocol.session_buffer == 0 {
            return Err(ConfigError::ValidationFailed(
                "session_buffer must be greater than 0".to_string(),
            ));
        }

        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Session settings derived from the protocol section
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            receive_timeout: self.protocol.receive_timeout,
            buffer: self.protocol.session_buffer,
        }
    }
}
