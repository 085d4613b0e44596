use thiserror::Error;

/// Unified error type for the Stork gateway
#[derive(Error, Debug)]
pub enum StorkError {
    // Pool errors
    #[error("Malformed proxy endpoint: {0}")]
    MalformedEndpoint(String),

    #[error("No proxies available")]
    NoProxiesAvailable,

    // Upstream errors
    #[error("Proxy connection failed: {0}")]
    ProxyConnectionFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Operation timed out")]
    Timeout,

    // Authentication errors
    #[error("Invalid credentials: username must not contain ':'")]
    InvalidCredentials,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Stork operations
pub type Result<T> = std::result::Result<T, StorkError>;

impl StorkError {
    /// Check if this error describes an unreachable or misbehaving upstream.
    ///
    /// Such errors mark a proxy unhealthy; anything else during a health
    /// round is unexpected and gets logged as a round failure.
    pub fn is_health_failure(&self) -> bool {
        matches!(
            self,
            StorkError::ProxyConnectionFailed(_)
                | StorkError::HealthCheckFailed(_)
                | StorkError::Timeout
                | StorkError::Io(_)
                | StorkError::Http(_)
        )
    }
}

// Convert from hyper errors
impl From<hyper::Error> for StorkError {
    fn from(err: hyper::Error) -> Self {
        StorkError::Http(err.to_string())
    }
}

impl From<hyper::http::Error> for StorkError {
    fn from(err: hyper::http::Error) -> Self {
        StorkError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for StorkError {
    fn from(err: url::ParseError) -> Self {
        StorkError::MalformedEndpoint(err.to_string())
    }
}
