//! # Configuration Management
//!
//! Centralized configuration for the BIG Chat client.
//!
//! ## Configuration Sources
//! - TOML files via [`ChatConfig::from_file`]
//! - Environment variables (`BIG_CHAT_*`) via [`ChatConfig::from_env`]
//! - Direct instantiation with defaults
//!
//! Command-line flags are applied on top of whichever source was loaded.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::error::{ProtocolError, Result};
use crate::transport::DEFAULT_MAX_BODY_SIZE;
use crate::utils::timeout;

/// Default length limit for a single outbound chat line
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024;

/// The message-length field is 16 bits wide
pub const MAX_MESSAGE_LEN_LIMIT: usize = u16::MAX as usize;

/// Main client configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChatConfig {
    /// Where to find the manager
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Session behaviour
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChatConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overlaid with `BIG_CHAT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `BIG_CHAT_*` environment variables onto this configuration.
    ///
    /// A variable that is set but unparsable is an error rather than silently ignored.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(address) = std::env::var("BIG_CHAT_MANAGER_ADDRESS") {
            self.manager.address = address;
        }
        if let Some(port) = env_parse::<u16>("BIG_CHAT_MANAGER_PORT")? {
            self.manager.port = port;
        }
        if let Some(port) = env_parse::<u16>("BIG_CHAT_NODE_PORT")? {
            self.client.node_port = Some(port);
        }
        if let Some(ms) = env_parse::<u64>("BIG_CHAT_CONNECT_TIMEOUT_MS")? {
            self.client.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(len) = env_parse::<usize>("BIG_CHAT_MAX_MESSAGE_LEN")? {
            self.client.max_message_len = len;
        }
        if let Ok(level) = std::env::var("BIG_CHAT_LOG_LEVEL") {
            self.logging.log_level = Level::from_str(&level)
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }
        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.manager.validate());
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {name}: {value}"))),
        Err(_) => Ok(None),
    }
}

/// Manager endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Dotted-quad IPv4 address
    pub address: String,

    /// TCP port; 0 means "not configured"
    pub port: u16,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1"),
            port: 0,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Manager address cannot be empty".to_string());
        } else if self.address.parse::<Ipv4Addr>().is_err() {
            errors.push(format!(
                "Invalid manager address: '{}' (expected a dotted-quad IPv4 address)",
                self.address
            ));
        }

        if self.port == 0 {
            errors.push("Manager port must be set (1-65535)".to_string());
        }

        errors
    }

    /// Resolve to a socket address
    pub fn socket_addr(&self) -> Result<SocketAddrV4> {
        let ip = self
            .address
            .parse::<Ipv4Addr>()
            .map_err(|_| ProtocolError::InvalidAddress(self.address.clone()))?;
        Ok(SocketAddrV4::new(ip, self.port))
    }
}

/// Client session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Port of the chat node; the manager's port when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,

    /// Deadline for each TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Longest chat line that will be sent, in bytes
    pub max_message_len: usize,

    /// Largest response body the client will allocate for
    pub max_body_size: u32,

    /// Request channel details after selecting a channel
    pub describe_channel: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_port: None,
            connect_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            describe_channel: true,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.node_port == Some(0) {
            errors.push("Node port cannot be 0".to_string());
        }

        if self.connect_timeout.is_zero() {
            errors.push("Connect timeout must be greater than 0".to_string());
        } else if self.connect_timeout > Duration::from_secs(300) {
            errors.push(format!(
                "Connect timeout too long: {:?} (maximum: 300s)",
                self.connect_timeout
            ));
        }

        if self.max_message_len == 0 {
            errors.push("Maximum message length must be greater than 0".to_string());
        } else if self.max_message_len > MAX_MESSAGE_LEN_LIMIT {
            errors.push(format!(
                "Maximum message length too large: {} (maximum: {MAX_MESSAGE_LEN_LIMIT})",
                self.max_message_len
            ));
        }

        if self.max_body_size < 64 {
            errors.push(format!(
                "Maximum body size too small: {} bytes (minimum: 64)",
                self.max_body_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name recorded on the session span
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("big-chat"),
            log_level: Level::WARN,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
