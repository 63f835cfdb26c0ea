//! Configuration file parsing for the API server.
//!
//! Loads settings from TOML files including bind address, database path,
//! JWT secret, token expiry, request deadline and log filter.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// SQLite database file, `:memory:` for a throwaway database
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// JWT secret for verifying request tokens
    pub jwt_secret: String,

    /// Token expiry in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,

    /// Deadline for the store work of one request (default: 10 seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_path() -> String {
    "tandem.db".to_string()
}

/// Default token expiry: 1 hour
fn default_token_expiry() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    10
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;

        // Validate required fields
        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingField("jwt_secret".to_string()));
        }
        if config.database_path.is_empty() {
            return Err(ConfigError::MissingField("database_path".to_string()));
        }

        Ok(config)
    }

    /// Create a default configuration for local development
    pub fn default_dev_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            database_path: default_database_path(),
            jwt_secret: "dev-secret-key-do-not-use-in-production".to_string(),
            token_expiry_secs: default_token_expiry(),
            request_timeout_secs: default_request_timeout(),
            log_filter: default_log_filter(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Request deadline as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default_dev_config();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.token_expiry_secs, 3600);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig::default_dev_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            database_path = "/var/lib/tandem/tandem.db"
            jwt_secret = "my-secret"
            token_expiry_secs = 7200
            request_timeout_secs = 3
            log_filter = "tandem_api=debug"
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.database_path, "/var/lib/tandem/tandem.db");
        assert_eq!(config.jwt_secret, "my-secret");
        assert_eq!(config.token_expiry_secs, 7200);
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.log_filter, "tandem_api=debug");
    }

    #[test]
    fn test_defaults_applied() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = "secret"
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.database_path, "tandem.db");
        assert_eq!(config.token_expiry_secs, 3600);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            jwt_secret = ""
        "#;

        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::MissingField(field)) if field == "jwt_secret"
        ));
    }
}
