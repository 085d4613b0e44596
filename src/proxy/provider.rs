//! Endpoint providers
//!
//! Providers supply raw endpoint strings during bootstrap. A missing source
//! is never an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::proxy::pool::ProxyBatch;

/// Source of candidate proxy endpoints
#[async_trait]
pub trait Provider: Send + Sync {
    /// Add every discovered endpoint to the batch being bootstrapped
    async fn provide(&self, batch: &mut ProxyBatch) -> Result<()>;

    /// Human readable name used in logs
    fn name(&self) -> String;
}

/// Reads a newline-delimited proxy list
///
/// Lines are trimmed; blank lines and `#` comments are skipped.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Provider for FileProvider {
    async fn provide(&self, batch: &mut ProxyBatch) -> Result<()> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Proxy list {} not found, skipping", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let added = add_endpoints(batch, &self.name(), endpoint_lines(&contents));
        info!("Loaded {} proxies from {}", added, self.path.display());
        Ok(())
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Endpoints given up front, e.g. from the environment
pub struct StaticProvider {
    endpoints: Vec<String>,
}

impl StaticProvider {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn provide(&self, batch: &mut ProxyBatch) -> Result<()> {
        let entries = self
            .endpoints
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        add_endpoints(batch, &self.name(), entries);
        Ok(())
    }

    fn name(&self) -> String {
        "static".to_string()
    }
}

/// Iterate the endpoint lines of a proxy list
pub fn endpoint_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Add entries one by one, logging and skipping malformed ones
fn add_endpoints<'a>(
    batch: &mut ProxyBatch,
    provider: &str,
    entries: impl Iterator<Item = &'a str>,
) -> usize {
    let mut added = 0;
    for raw in entries {
        match batch.add(raw) {
            Ok(()) => added += 1,
            Err(e) => warn!("Provider {} skipped endpoint {:?}: {}", provider, raw, e),
        }
    }
    added
}
