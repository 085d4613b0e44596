//! Background services

pub mod reload;

pub use reload::{ReloadHandle, ReloadService};
