//! Configuration structures for the tls-runtime.
//!
//! This module defines configuration options for the runtime:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineOptions`]: Where the native engine artifact lives
//! - [`PoolConfig`]: Size of the dispatch pool

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from TOML or JSON, or built in code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine artifact location.
    #[serde(default)]
    pub engine: EngineOptions,

    /// Dispatch pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Engine artifact location options.
///
/// These are the only engine options the runtime recognizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineOptions {
    /// Use exactly this artifact and never download.
    ///
    /// When set, a missing file is a `MissingCustomEngine` error.
    #[serde(default)]
    pub custom_library_path: Option<PathBuf>,

    /// Directory used for auto-resolved downloads.
    ///
    /// Ignored when `custom_library_path` is set.
    #[serde(default)]
    pub custom_library_download_path: Option<PathBuf>,
}

impl EngineOptions {
    /// Returns `true` if auto-resolution has been overridden by the caller.
    pub fn is_custom_path(&self) -> bool {
        self.custom_library_path.is_some()
    }
}

/// Dispatch pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of worker slots, each with its own bound engine.
    #[serde(default = "defaults::workers")]
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    /// One slot per core, leaving one for the host's primary context.
    pub fn workers() -> usize {
        std::thread::available_parallelism()
            .map_or(1, |n| n.get().saturating_sub(1))
            .max(1)
    }
}
