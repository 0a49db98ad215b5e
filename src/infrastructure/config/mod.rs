//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading from `.circuitflow/`
//! - `CIRCUITFLOW_*` environment variable overrides
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR};
