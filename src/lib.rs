//! Stork - rotating forward-proxy gateway
//!
//! Accepts raw TCP connections, picks a healthy upstream HTTP proxy from a
//! pool and relays bytes both ways, injecting the upstream's
//! `Proxy-Authorization` header when it needs one.
//!
//! ## Features
//!
//! - Pool populated from pluggable providers (proxy list file, static list)
//! - Random selection over the healthy subset
//! - Periodic health checks through each proxy
//! - Atomic pool reload on request (e.g. `SIGHUP`)

pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod services;

pub use config::Config;
pub use error::{Result, StorkError};
