//! Proxy selection strategies
//!
//! A strategy picks one record from the pool's current healthy view.

mod random;

pub use random::RandomStrategy;

use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, StorkError};
use crate::models::ProxyRecord;

/// Strategy types for proxy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    #[default]
    Random,
}

impl RotationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
        }
    }
}

impl FromStr for RotationStrategy {
    type Err = StorkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Self::Random),
            other => Err(StorkError::InvalidConfig(format!(
                "unknown selection strategy: {}",
                other
            ))),
        }
    }
}

/// Trait for proxy selection strategies
///
/// Implementations receive the healthy view in insertion order and must not
/// keep state across calls beyond their randomness source.
pub trait SelectionStrategy: Send + Sync {
    /// Select a proxy from the healthy set
    ///
    /// Returns `NoProxiesAvailable` if the set is empty
    fn select(&self, healthy: &[Arc<ProxyRecord>]) -> Result<Arc<ProxyRecord>>;

    /// Get the strategy name
    fn strategy_name(&self) -> &'static str;
}

/// Create a selection strategy based on the strategy type
pub fn create_strategy(strategy: RotationStrategy) -> Arc<dyn SelectionStrategy> {
    match strategy {
        RotationStrategy::Random => Arc::new(RandomStrategy::new()),
    }
}
