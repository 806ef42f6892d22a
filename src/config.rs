/// Configuration Module
///
/// Provides configuration management for the call gateway.
/// Handles loading and parsing of the YAML configuration file and environment variables.
/// Every secret is optional at load time: a missing value is reported per request
/// as a server configuration error instead of preventing startup.
///
/// # Copyright
/// Copyright (c) 2025
///
/// # License
/// Licensed under the AGPLv3 license.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use config::{Config as ConfigFile, Environment, File, FileFormat};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config/application.yml";

/// Environment variable that overrides [`DEFAULT_CONFIG_FILE`]
pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";

/// Longest accepted rate-limit window (one day)
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Key callers by `X-Forwarded-For` / `X-Real-IP` instead of the socket peer.
    /// Enable only behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitSettings {
    /// Requests admitted per key within one window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// How often idle keys are swept, in seconds
    pub sweep_interval_secs: u64,
    /// Keys idle for longer than this are dropped by the sweep, in seconds
    pub idle_retention_secs: u64,
}

/// Voice provider configuration
#[derive(Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
    /// Provider API root, without trailing slash
    pub base_url: String,
    /// Provider API key, sent as a request header
    pub api_key: Option<String>,
    /// Conversational agent placing the call
    pub agent_id: Option<String>,
    /// Provider-side phone number the agent calls from
    pub agent_phone_number_id: Option<String>,
}

impl fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("agent_id", &self.agent_id)
            .field("agent_phone_number_id", &self.agent_phone_number_id)
            .finish()
    }
}

/// Shared-secret configuration
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    /// Expected credential token (64 hex characters)
    pub password_hash: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application configuration settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,
    /// Voice provider configuration
    pub voice: VoiceConfig,
    /// Shared-secret configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Config {
    /// Creates a new Config instance by loading and merging configuration from multiple sources.
    ///
    /// # Configuration Sources
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Built-in defaults
    /// 2. Optional configuration file (`config/application.yml`, or `$APP_CONFIG_FILE`)
    /// 3. Environment variables (prefixed with `APP__`, nested with `__`)
    ///
    /// # Errors
    /// Returns a `ConfigError` if values cannot be parsed or are out of range.
    pub fn new() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = Self::defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(environment())
            .build()?;

        Self::finish(config)
    }

    /// Loads configuration from an in-memory YAML document layered over the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;

        Self::finish(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(ConfigFile::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.trust_forwarded_headers", false)?
            .set_default("rate_limit.max_requests", 10)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.sweep_interval_secs", 300)?
            .set_default("rate_limit.idle_retention_secs", 600)?
            .set_default("voice.base_url", "https://api.elevenlabs.io")?)
    }

    fn finish(config: ConfigFile) -> Result<Self, ConfigError> {
        let mut parsed: Config = config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        parsed.normalize();
        parsed.validate()?;
        Ok(parsed)
    }

    /// Blank secrets count as missing.
    fn normalize(&mut self) {
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *value = None;
            }
        }
        blank_to_none(&mut self.voice.api_key);
        blank_to_none(&mut self.voice.agent_id);
        blank_to_none(&mut self.voice.agent_phone_number_id);
        blank_to_none(&mut self.auth.password_hash);
        self.voice.base_url = self.voice.base_url.trim_end_matches('/').to_string();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue("rate_limit.max_requests must be at least 1".into()));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "rate_limit.window_secs must be between 1 and {}",
                MAX_WINDOW_SECS
            )));
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("rate_limit.sweep_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `APP__SECTION__KEY` variables. Values stay strings until deserialization,
/// so numeric-looking secrets are not coerced.
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("__")
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(!config.server.trust_forwarded_headers);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.sweep_interval_secs, 300);
        assert_eq!(config.rate_limit.idle_retention_secs, 600);
        assert_eq!(config.voice.base_url, "https://api.elevenlabs.io");
        assert!(config.voice.api_key.is_none());
        assert!(config.auth.password_hash.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let yaml = r#"
server:
  port: 8080
rate_limit:
  max_requests: 5
voice:
  base_url: "http://localhost:9999/"
  api_key: "xi-test"
  agent_id: "agent_123"
auth:
  password_hash: "  "
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.voice.base_url, "http://localhost:9999");
        assert_eq!(config.voice.api_key.as_deref(), Some("xi-test"));
        assert_eq!(config.voice.agent_id.as_deref(), Some("agent_123"));
        assert!(config.auth.password_hash.is_none());
    }

    #[test]
    fn test_window_bounds() {
        let err = Config::from_yaml_str("rate_limit:\n  window_secs: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = Config::from_yaml_str("rate_limit:\n  window_secs: 86401\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let config = Config::from_yaml_str("rate_limit:\n  window_secs: 86400\n").unwrap();
        assert_eq!(config.rate_limit.window_secs, MAX_WINDOW_SECS);
    }

    #[test]
    fn test_environment_keeps_secrets_as_strings() {
        let mut vars = config::Map::new();
        vars.insert("APP__VOICE__API_KEY".to_string(), "0012345".to_string());
        vars.insert("APP__AUTH__PASSWORD_HASH".to_string(), "1e5".to_string());
        vars.insert("APP__SERVER__PORT".to_string(), "8081".to_string());
        vars.insert("APP__SERVER__TRUST_FORWARDED_HEADERS".to_string(), "true".to_string());

        let built = Config::defaults()
            .unwrap()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap();
        let config = Config::finish(built).unwrap();

        assert_eq!(config.voice.api_key.as_deref(), Some("0012345"));
        assert_eq!(config.auth.password_hash.as_deref(), Some("1e5"));
        assert_eq!(config.server.port, 8081);
        assert!(config.server.trust_forwarded_headers);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let yaml = "voice:\n  api_key: \"super-secret\"\nauth:\n  password_hash: \"abc\"\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("\"abc\""));
        assert!(printed.contains("<redacted>"));
    }
}
