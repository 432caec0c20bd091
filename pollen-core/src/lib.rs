//! Core library for the `pollen` CLI.
//!
//! This crate defines:
//! - The provider-agnostic pollen report
//! - Adapters for the upstream allergy forecast services
//! - The aggregator that races them and keeps the first usable report
//! - Configuration handling
//!
//! It is used by `pollen-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use aggregator::PollenAggregator;
pub use config::{Config, ProviderConfig};
pub use error::ProviderError;
pub use model::PollenReport;
pub use provider::{PollenProvider, ProviderId};
