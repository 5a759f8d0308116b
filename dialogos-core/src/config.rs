//! Configuration types for the conversation scope

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConversationError, Result};

/// Request parameter carrying the conversation id
pub const DEFAULT_PARAMETER_NAME: &str = "cid";

/// Idle timeout applied to new conversations (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum wait for a conversation lock (1 second)
pub const DEFAULT_CONCURRENT_ACCESS_TIMEOUT: Duration = Duration::from_millis(1000);

/// Conversation scope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Name of the request parameter carrying the conversation id
    #[serde(default = "default_parameter_name")]
    pub parameter_name: String,

    /// Idle timeout given to newly created conversations
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub default_timeout: Duration,

    /// How long `activate` waits for a busy conversation before falling back
    #[serde(default = "default_concurrent_access_timeout", with = "humantime_serde")]
    pub concurrent_access_timeout: Duration,
}

fn default_parameter_name() -> String {
    DEFAULT_PARAMETER_NAME.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_concurrent_access_timeout() -> Duration {
    DEFAULT_CONCURRENT_ACCESS_TIMEOUT
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            parameter_name: default_parameter_name(),
            default_timeout: DEFAULT_TIMEOUT,
            concurrent_access_timeout: DEFAULT_CONCURRENT_ACCESS_TIMEOUT,
        }
    }
}

impl ConversationConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (dialogos.toml, then the path from DIALOGOS_CONFIG_PATH)
    /// 3. Environment variable overrides (DIALOGOS_PARAMETER_NAME, DIALOGOS_DEFAULT_TIMEOUT, ...)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ConversationConfig::default()))
            .merge(Toml::file("dialogos.toml"));

        if let Ok(path) = std::env::var("DIALOGOS_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ConversationConfig = figment
            .merge(Env::prefixed("DIALOGOS_").ignore(&["CONFIG_PATH"]))
            .extract()
            .map_err(|e| {
                ConversationError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: ConversationConfig =
            Figment::from(Serialized::defaults(ConversationConfig::default()))
                .merge(Toml::file(path))
                .extract()
                .map_err(|e| {
                    ConversationError::Configuration(format!(
                        "Failed to load configuration file: {}",
                        e
                    ))
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty parameter name or a zero lock timeout.
    pub fn validate(&self) -> Result<()> {
        if self.parameter_name.trim().is_empty() {
            return Err(ConversationError::Configuration(
                "parameter_name must not be empty".to_string(),
            ));
        }
        if self.concurrent_access_timeout.is_zero() {
            return Err(ConversationError::Configuration(
                "concurrent_access_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ConversationConfig
pub struct ConfigBuilder {
    config: ConversationConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ConversationConfig::default(),
        }
    }

    /// Set the conversation id parameter name
    pub fn parameter_name(mut self, name: impl Into<String>) -> Self {
        self.config.parameter_name = name.into();
        self
    }

    /// Set the default conversation timeout
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Set the lock acquisition timeout
    pub fn concurrent_access_timeout(mut self, timeout: Duration) -> Self {
        self.config.concurrent_access_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConversationConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConversationConfig::default();
        assert_eq!(config.parameter_name, "cid");
        assert_eq!(config.default_timeout, Duration::from_secs(600));
        assert_eq!(config.concurrent_access_timeout, Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .parameter_name("conversation")
            .default_timeout(Duration::from_secs(30))
            .concurrent_access_timeout(Duration::from_millis(100))
            .build();

        assert_eq!(config.parameter_name, "conversation");
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.concurrent_access_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_empty_parameter_name() {
        let config = ConfigBuilder::new().parameter_name("  ").build();
        assert!(matches!(
            config.validate(),
            Err(ConversationError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_lock_timeout() {
        let config = ConfigBuilder::new()
            .concurrent_access_timeout(Duration::ZERO)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_with_partial_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_timeout = \"5m\"").unwrap();
        writeln!(file, "concurrent_access_timeout = \"250ms\"").unwrap();

        let config = ConversationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.parameter_name, "cid");
        assert_eq!(config.default_timeout, Duration::from_secs(300));
        assert_eq!(config.concurrent_access_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_file_invalid_duration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_timeout = \"soon\"").unwrap();

        assert!(ConversationConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_serde_roundtrip_uses_humantime() {
        let json = serde_json::to_value(ConversationConfig::default()).unwrap();
        assert_eq!(json["default_timeout"], "10m");
        assert_eq!(json["concurrent_access_timeout"], "1s");
    }
}
