use crate::error::{Result, StorkError};
use crate::proxy::health::HealthCheckerConfig;
use crate::proxy::rotation::RotationStrategy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server configuration
    pub server: RelayServerConfig,
    /// Proxy pool configuration
    pub pool: PoolConfig,
    /// Health checker configuration
    pub health: HealthCheckConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: String,
    /// Port for the relay server (default: 9080)
    pub port: u16,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9080,
        }
    }
}

impl RelayServerConfig {
    /// Get the listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Directory holding `proxies.txt`
    pub data_dir: PathBuf,
    /// Selection strategy
    pub strategy: RotationStrategy,
    /// Extra endpoints given inline
    pub static_proxies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Seconds between health check rounds
    pub interval: u64,
    /// Per-proxy check timeout in seconds
    pub timeout: u64,
    /// Endpoint requested through each proxy
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let health = HealthCheckConfig {
            interval: get_env_or("STORK_HEALTHCHECK_INTERVAL", "600")
                .parse::<u64>()
                .map_err(|_| {
                    StorkError::InvalidConfig(
                        "STORK_HEALTHCHECK_INTERVAL must be a number of seconds".into(),
                    )
                })?
                .max(1),
            timeout: get_env_or("STORK_HEALTHCHECK_TIMEOUT", "10")
                .parse::<u64>()
                .map_err(|_| {
                    StorkError::InvalidConfig(
                        "STORK_HEALTHCHECK_TIMEOUT must be a number of seconds".into(),
                    )
                })?
                .max(1),
            url: get_env_or("STORK_HEALTHCHECK_URL", "https://google.com"),
        };

        let scheme = health.url.split_once("://").map(|(s, _)| s.to_lowercase());
        if !matches!(scheme.as_deref(), Some("http") | Some("https")) {
            return Err(StorkError::InvalidConfig(
                "STORK_HEALTHCHECK_URL must be an http or https URL".into(),
            ));
        }

        Ok(Config {
            server: RelayServerConfig {
                host: get_env_or("STORK_HOST", "127.0.0.1"),
                port: get_env_or("STORK_PORT", "9080").parse().map_err(|_| {
                    StorkError::InvalidConfig("STORK_PORT must be a valid port number".into())
                })?,
            },
            pool: PoolConfig {
                data_dir: expand_home(&get_env_or("STORK_DATA_DIR", "./.config/stork")),
                strategy: get_env_or("STORK_STRATEGY", "random").parse()?,
                static_proxies: get_env_or("STORK_PROXIES", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            health,
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Path of the proxy list read by the file provider
    pub fn proxies_file(&self) -> PathBuf {
        self.pool.data_dir.join("proxies.txt")
    }

    /// Get the relay server address
    pub fn listen_addr(&self) -> String {
        self.server.listen_addr()
    }

    /// Settings for the health checker
    pub fn health_checker(&self) -> HealthCheckerConfig {
        HealthCheckerConfig {
            check_interval: Duration::from_secs(self.health.interval),
            check_timeout: Duration::from_secs(self.health.timeout),
            check_url: self.health.url.clone(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
