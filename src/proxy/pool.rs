//! Proxy pool
//!
//! Owns the upstream records, the providers that populate them and the
//! active selection strategy. The record list is published through an
//! `ArcSwap`, so bootstrap builds a replacement off to the side and swaps
//! it in one step; readers never observe a half-populated pool.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::ProxyRecord;
use crate::proxy::provider::Provider;
use crate::proxy::rotation::{RandomStrategy, SelectionStrategy};

/// Records collected during one bootstrap, not yet visible to readers
#[derive(Debug, Default)]
pub struct ProxyBatch {
    records: Vec<Arc<ProxyRecord>>,
}

impl ProxyBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and append an endpoint. Duplicates are kept.
    pub fn add(&mut self, raw: &str) -> Result<()> {
        let record = ProxyRecord::parse(raw)?;
        self.records.push(Arc::new(record));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Staged records, in provider order
    pub fn records(&self) -> &[Arc<ProxyRecord>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Arc<ProxyRecord>> {
        self.records
    }
}

/// Pool of upstream proxies
pub struct ProxyPool {
    records: ArcSwap<Vec<Arc<ProxyRecord>>>,
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    strategy: RwLock<Arc<dyn SelectionStrategy>>,
}

impl ProxyPool {
    /// Create an empty pool
    pub fn new(providers: Vec<Arc<dyn Provider>>, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self {
            records: ArcSwap::from_pointee(Vec::new()),
            providers: RwLock::new(providers),
            strategy: RwLock::new(strategy),
        }
    }

    pub fn add_provider(&self, provider: Arc<dyn Provider>) {
        self.providers.write().push(provider);
    }

    pub fn set_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        info!("Switching selection strategy to {}", strategy.strategy_name());
        *self.strategy.write() = strategy;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.read().strategy_name()
    }

    /// Populate the pool from every provider and publish the result.
    ///
    /// A failing provider is logged and skipped. Returns the number of
    /// records now in the pool.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> usize {
        let batch = self.stage().await;
        self.publish(batch)
    }

    /// Collect a fresh batch from every provider without touching the live
    /// records
    pub async fn stage(&self) -> ProxyBatch {
        let providers = self.providers.read().clone();

        let mut batch = ProxyBatch::new();
        for provider in providers {
            if let Err(e) = provider.provide(&mut batch).await {
                warn!("Provider {} failed: {}", provider.name(), e);
            }
        }
        batch
    }

    /// Replace the live records with `batch` in one step
    pub fn publish(&self, batch: ProxyBatch) -> usize {
        let count = batch.len();
        self.records.store(Arc::new(batch.into_records()));
        info!("Proxy pool bootstrapped with {} proxies", count);
        count
    }

    /// Parse and append one endpoint to the live pool
    pub fn add(&self, raw: &str) -> Result<()> {
        let record = Arc::new(ProxyRecord::parse(raw)?);
        self.records.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(record.clone());
            next
        });
        Ok(())
    }

    /// Pick a healthy proxy with the active strategy
    pub fn pick(&self) -> Result<Arc<ProxyRecord>> {
        let healthy = self.healthy_view();
        let strategy = self.strategy.read().clone();
        strategy.select(&healthy)
    }

    /// Discard all records. Providers and strategy are untouched.
    pub fn clear(&self) {
        self.records.store(Arc::new(Vec::new()));
    }

    /// Healthy records in insertion order
    pub fn healthy_view(&self) -> Vec<Arc<ProxyRecord>> {
        self.records
            .load()
            .iter()
            .filter(|r| r.is_healthy())
            .cloned()
            .collect()
    }

    /// Snapshot of every record, healthy or not
    pub fn records(&self) -> Arc<Vec<Arc<ProxyRecord>>> {
        self.records.load_full()
    }

    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.load().is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.records.load().iter().filter(|r| r.is_healthy()).count()
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new(Vec::new(), Arc::new(RandomStrategy::new()))
    }
}
