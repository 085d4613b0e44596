//! Pool reload service
//!
//! Owns the bootstrap/health-check lifecycle of the pool. Each reload
//! request stages a fresh record set from every provider, checks it, then
//! publishes it and restarts the health checker.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::proxy::health::{HealthChecker, HealthCheckerConfig, HealthCheckerHandle};
use crate::proxy::pool::ProxyPool;

/// Sends reload requests to a running [`ReloadService`]
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<()>,
}

impl ReloadHandle {
    /// Ask for a reload. Requests arriving while one is pending are merged.
    pub fn request(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => debug!("Reload already pending"),
            Err(mpsc::error::TrySendError::Closed(())) => debug!("Reload service is gone"),
        }
    }
}

/// Pool reload service
pub struct ReloadService {
    pool: Arc<ProxyPool>,
    health_config: HealthCheckerConfig,
    health: Option<(HealthCheckerHandle, JoinHandle<()>)>,
}

impl ReloadService {
    pub fn new(pool: Arc<ProxyPool>, health_config: HealthCheckerConfig) -> Self {
        Self {
            pool,
            health_config,
            health: None,
        }
    }

    /// Create the channel feeding reload requests into [`ReloadService::run`]
    pub fn channel() -> (ReloadHandle, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (ReloadHandle { tx }, rx)
    }

    /// Bootstrap once, then serve reload requests until shutdown
    #[instrument(skip(self, reload_rx, shutdown))]
    pub async fn run(
        mut self,
        mut reload_rx: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.reload().await;

        loop {
            tokio::select! {
                request = reload_rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                    info!("Reload requested");
                    self.reload().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reload service shutting down");
        self.stop_health_checker().await;
    }

    /// Re-bootstrap the pool and restart the health checker.
    ///
    /// The new record set gets one health round before it is published, so
    /// connections arriving mid-reload keep using the previous pool and the
    /// ones arriving after it find the reachable proxies already healthy.
    pub async fn reload(&mut self) {
        info!("Bootstrapping proxy pool providers...");
        let batch = self.pool.stage().await;

        let checker = HealthChecker::new(self.pool.clone(), self.health_config.clone());
        let checked = match checker.check_records(batch.records()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not check staged proxies: {}", e);
                false
            }
        };

        let count = self.pool.publish(batch);
        info!("Proxy pool holds {} proxies", count);

        self.stop_health_checker().await;

        info!("Starting health check task");
        let (handle, shutdown) = HealthCheckerHandle::new();
        let task = tokio::spawn(async move {
            if checked {
                checker.resume(shutdown).await
            } else {
                checker.run(shutdown).await
            }
        });
        self.health = Some((handle, task));
    }

    async fn stop_health_checker(&mut self) {
        if let Some((handle, task)) = self.health.take() {
            handle.shutdown();
            let _ = task.await;
        }
    }
}
