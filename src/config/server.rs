//! HTTP server configuration

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request timeout in seconds, covering provider API calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// CORS allowed origins (comma-separated). Unset means any origin.
    pub cors_origins: Option<String>,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ValidationError::InvalidHost)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.socket_addr()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            cors_origins: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info,biolink_billing=debug,sqlx=warn".to_string()
}

fn default_request_timeout() -> u64 {
    30
}
