//! Engine artifact location and download for tls-runtime.
//!
//! - [`locator`]: Resolves the artifact path and release URL for a platform
//! - [`acquirer`]: Ensures the artifact is on disk, streaming it if needed
//!
//! # Acquisition rules
//!
//! 1. If the artifact exists, nothing happens.
//! 2. If the caller configured a custom path, a missing file is an error and
//!    the network is never touched.
//! 3. Otherwise the release is downloaded to the resolved path.

pub mod acquirer;
pub mod locator;

pub use acquirer::{Acquisition, EngineAcquirer};
pub use locator::{DependencyLocator, ENGINE_VERSION, EngineArtifact, Platform};
