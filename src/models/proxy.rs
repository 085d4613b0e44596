use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use url::Url;

use crate::error::{Result, StorkError};

/// Upstream proxy protocol
///
/// Only plain HTTP forward proxies are relayed; `https` endpoints are
/// accepted and dialed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyProtocol {
    Http,
    Https,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the most recent health check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthState {
    /// False until the first successful check
    pub healthy: bool,
    /// Round trip of the last successful check
    pub latency: Option<Duration>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// One upstream proxy endpoint plus its runtime statistics.
///
/// Endpoint fields are fixed at construction. Health fields are written only
/// by the health checker and the usage counter only by relay sessions, so the
/// two live behind separate primitives.
#[derive(Debug)]
pub struct ProxyRecord {
    endpoint_url: String,
    protocol: ProxyProtocol,
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    usage_count: AtomicU64,
    health: RwLock<HealthState>,
}

impl ProxyRecord {
    /// Parse a raw endpoint, either `host:port` or
    /// `scheme://[user:password@]host:port`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StorkError::MalformedEndpoint("empty endpoint".to_string()));
        }

        let endpoint_url = match raw.split_once("://") {
            Some((scheme, _)) => {
                if ProxyProtocol::from_str(scheme).is_none() {
                    return Err(StorkError::MalformedEndpoint(format!(
                        "unsupported scheme '{}' in {}",
                        scheme, raw
                    )));
                }
                raw.to_string()
            }
            None => format!("http://{}", raw),
        };

        let url = Url::parse(&endpoint_url)
            .map_err(|e| StorkError::MalformedEndpoint(format!("{}: {}", raw, e)))?;

        let protocol = ProxyProtocol::from_str(url.scheme()).ok_or_else(|| {
            StorkError::MalformedEndpoint(format!("unsupported scheme in {}", raw))
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StorkError::MalformedEndpoint(format!("missing host in {}", raw)))?
            .to_string();

        let port = url
            .port_or_known_default()
            .ok_or_else(|| StorkError::MalformedEndpoint(format!("missing port in {}", raw)))?;

        let username = if url.username().is_empty() {
            None
        } else {
            Some(percent_decode(url.username())?)
        };

        let password = match (&username, url.password()) {
            (None, _) => None,
            (Some(_), None) => Some(String::new()),
            (Some(_), Some(p)) => Some(percent_decode(p)?),
        };

        Ok(Self {
            endpoint_url,
            protocol,
            host,
            port,
            username,
            password,
            usage_count: AtomicU64::new(0),
            health: RwLock::new(HealthState::default()),
        })
    }

    /// Normalized endpoint URL, `http://` prefixed when the input had no scheme
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn protocol(&self) -> ProxyProtocol {
        self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address suitable for `TcpStream::connect`
    pub fn address(&self) -> (&str, u16) {
        // Url keeps IPv6 literals bracketed
        let host = self
            .host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host);
        (host, self.port)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Whether the upstream expects a `Proxy-Authorization` header
    pub fn requires_auth(&self) -> bool {
        self.username.is_some()
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> HealthState {
        *self.health.read()
    }

    pub fn is_healthy(&self) -> bool {
        self.health.read().healthy
    }

    /// Record the outcome of a health check.
    ///
    /// `Some(latency)` marks the proxy healthy, `None` marks it unhealthy
    /// and clears the latency.
    pub(crate) fn record_health_check(&self, latency: Option<Duration>) {
        let mut health = self.health.write();
        health.healthy = latency.is_some();
        health.latency = latency;
        health.last_checked_at = Some(Utc::now());
    }

    /// Count one completed relay session
    pub(crate) fn record_usage(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn percent_decode(s: &str) -> Result<String> {
    urlencoding::decode(s)
        .map(|v| v.into_owned())
        .map_err(|e| StorkError::MalformedEndpoint(format!("invalid credentials encoding: {}", e)))
}
