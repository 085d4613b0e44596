//! Health checking for upstream proxies
//!
//! Periodically probes every pool record through the proxy itself and
//! updates its health state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper::header::{HOST, PROXY_AUTHORIZATION};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::{Result, StorkError};
use crate::models::ProxyRecord;
use crate::proxy::pool::ProxyPool;
use crate::proxy::transport::{proxy_authorization, ProxyTransport};

/// Health checker configuration
#[derive(Debug, Clone)]
pub struct HealthCheckerConfig {
    /// Interval between health check rounds
    pub check_interval: Duration,
    /// Timeout for each proxy check
    pub check_timeout: Duration,
    /// Well-known endpoint requested through each proxy
    pub check_url: String,
}

impl Default for HealthCheckerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(600),
            check_timeout: Duration::from_secs(10),
            check_url: "https://google.com".to_string(),
        }
    }
}

/// Where a health probe goes and how
#[derive(Debug, Clone, PartialEq, Eq)]
struct CheckTarget {
    url: String,
    host: String,
    port: u16,
    tunnel: bool,
}

impl CheckTarget {
    fn parse(check_url: &str) -> Result<Self> {
        let url = Url::parse(check_url)
            .map_err(|e| StorkError::InvalidConfig(format!("health check url: {}", e)))?;

        let tunnel = match url.scheme() {
            "http" => false,
            "https" => true,
            other => {
                return Err(StorkError::InvalidConfig(format!(
                    "health check url has unsupported scheme: {}",
                    other
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| {
                StorkError::InvalidConfig("health check url must include a host".into())
            })?
            .to_string();
        let port = url.port_or_known_default().ok_or_else(|| {
            StorkError::InvalidConfig("health check url must include a port".into())
        })?;

        Ok(Self {
            url: url.to_string(),
            host,
            port,
            tunnel,
        })
    }

    fn host_header(&self) -> String {
        let default_port = if self.tunnel { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Health checker for upstream proxies
pub struct HealthChecker {
    pool: Arc<ProxyPool>,
    config: HealthCheckerConfig,
}

impl HealthChecker {
    /// Create a new health checker
    pub fn new(pool: Arc<ProxyPool>, config: HealthCheckerConfig) -> Self {
        Self { pool, config }
    }

    /// Run the health checker (call in a spawned task)
    ///
    /// Rounds never overlap. The loop exits when shutdown is signalled or
    /// its handle is dropped, without finishing the current round or sleep.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        self.run_rounds(shutdown, true).await
    }

    /// Same as [`HealthChecker::run`], but waits one interval before the
    /// first round. Used when the records were checked just before publish.
    pub async fn resume(&self, shutdown: watch::Receiver<bool>) {
        self.run_rounds(shutdown, false).await
    }

    #[instrument(skip(self, shutdown))]
    async fn run_rounds(&self, mut shutdown: watch::Receiver<bool>, mut check_now: bool) {
        info!(
            "Starting health checker with {}s interval",
            self.config.check_interval.as_secs()
        );

        loop {
            if check_now {
                tokio::select! {
                    result = self.check_all_proxies() => {
                        if let Err(e) = result {
                            error!("Health check round failed: {}", e);
                        }
                    }
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }
            check_now = true;

            tokio::select! {
                _ = sleep(self.config.check_interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!("Health checker shutting down");
    }

    /// Check all proxies concurrently and update their health status
    pub async fn check_all_proxies(&self) -> Result<()> {
        let proxies = self.pool.records();
        self.check_records(&proxies).await
    }

    /// Check the given records concurrently, whether or not they are live yet
    pub async fn check_records(&self, proxies: &[Arc<ProxyRecord>]) -> Result<()> {
        let target = CheckTarget::parse(&self.config.check_url)?;

        info!("Starting health check of {} proxies", proxies.len());

        let results = futures::future::join_all(
            proxies.iter().map(|proxy| self.check_and_record(proxy, &target)),
        )
        .await;

        let healthy_count = results.iter().filter(|&&v| v).count();
        info!("{} of {} proxies are healthy", healthy_count, results.len());

        Ok(())
    }

    async fn check_and_record(&self, proxy: &ProxyRecord, target: &CheckTarget) -> bool {
        match self.check_proxy(proxy, target).await {
            Ok(latency) => {
                proxy.record_health_check(Some(latency));
                info!(
                    "Proxy {} is healthy, latency: {:.3}s",
                    proxy,
                    latency.as_secs_f64()
                );
                true
            }
            Err(e) => {
                proxy.record_health_check(None);
                if e.is_health_failure() {
                    info!("Proxy {} is unhealthy: {}", proxy, e);
                } else {
                    warn!("Proxy {} check could not run: {}", proxy, e);
                }
                false
            }
        }
    }

    /// Check a single proxy, returning the round trip on success
    #[instrument(skip(self, proxy, target), fields(proxy = %proxy))]
    async fn check_proxy(&self, proxy: &ProxyRecord, target: &CheckTarget) -> Result<Duration> {
        debug!("Checking health of proxy via {}", target.url);

        let started = Instant::now();
        let probe = async {
            if target.tunnel {
                ProxyTransport::connect_tunnel(proxy, &target.host, target.port)
                    .await
                    .map(|_| ())
            } else {
                Self::forward_request(proxy, target).await
            }
        };

        match timeout(self.config.check_timeout, probe).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StorkError::Timeout),
        }
    }

    /// Send a plain forward-proxy GET for the check URL through the proxy
    async fn forward_request(proxy: &ProxyRecord, target: &CheckTarget) -> Result<()> {
        let stream = ProxyTransport::dial(proxy).await?;
        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let conn_task = tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Health check connection ended: {}", e);
            }
        });

        let mut request = Request::builder()
            .method(Method::GET)
            .uri(target.url.as_str())
            .header(HOST, target.host_header());
        if let Some(auth) = proxy_authorization(proxy)? {
            request = request.header(PROXY_AUTHORIZATION, auth);
        }
        let request = request.body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await;
        conn_task.abort();
        let status = response?.status();

        if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED || status.is_server_error() {
            return Err(StorkError::HealthCheckFailed(format!(
                "upstream answered {}",
                status
            )));
        }

        Ok(())
    }
}

/// Resolves once shutdown is requested or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Guard for managing health checker lifecycle
pub struct HealthCheckerHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl HealthCheckerHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
