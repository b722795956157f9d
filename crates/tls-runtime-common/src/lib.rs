//! Common errors and configuration for tls-runtime.
//!
//! This crate provides shared functionality used across the tls-runtime workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine location and pool sizing
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineOptions, PoolConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, LogConfig};
pub use error::RuntimeError;
