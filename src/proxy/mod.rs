//! Proxy gateway core
//!
//! This module provides:
//! - The proxy pool with pluggable providers and selection strategies
//! - Health checking of pool members
//! - The relay server and its byte pipes with credential injection

pub mod health;
pub mod pool;
pub mod provider;
pub mod rotation;
pub mod server;
pub mod transport;
pub mod tunnel;

pub use health::{HealthChecker, HealthCheckerConfig, HealthCheckerHandle};
pub use pool::{ProxyBatch, ProxyPool};
pub use provider::{FileProvider, Provider, StaticProvider};
pub use rotation::{create_strategy, RandomStrategy, RotationStrategy, SelectionStrategy};
pub use server::RelayServer;
pub use transport::{basic_auth, ProxyTransport};
