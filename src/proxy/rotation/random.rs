//! Random proxy selection strategy

use rand::seq::SliceRandom;
use std::sync::Arc;

use super::SelectionStrategy;
use crate::error::{Result, StorkError};
use crate::models::ProxyRecord;

/// Selects a uniformly random proxy from the healthy set
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RandomStrategy {
    fn select(&self, healthy: &[Arc<ProxyRecord>]) -> Result<Arc<ProxyRecord>> {
        let mut rng = rand::thread_rng();
        healthy
            .choose(&mut rng)
            .cloned()
            .ok_or(StorkError::NoProxiesAvailable)
    }

    fn strategy_name(&self) -> &'static str {
        "random"
    }
}
