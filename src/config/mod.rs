//! Configuration module for the reviewer assignment service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

/// Deployment environment, selects log verbosity and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse an `ENV` value. Anything that is not `development` runs as production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Default tracing filter directive for this environment.
    pub fn log_level(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub http_port: u16,
    /// SQLite connection string
    pub database_url: String,
    /// Deployment environment
    pub env: Environment,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = env::var("HTTP_PORT").unwrap_or_else(|_| "8080".to_string());
        let http_port = port.trim().parse().map_err(|_| ConfigError {
            key: "HTTP_PORT",
            value: port.clone(),
        })?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/reviewers.sqlite?mode=rwc".to_string());

        let env = env::var("ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        Ok(Self {
            http_port,
            database_url,
            env,
        })
    }

    /// Address to bind the server to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.http_port))
    }
}
