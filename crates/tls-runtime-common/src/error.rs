//! Error types for the tls-runtime.
//!
//! Every failure the runtime can surface to a host is a [`RuntimeError`]. The
//! variants fall into three groups:
//! - bring-up failures, local to the worker slot that hit them
//!   ([`RuntimeError::UnsupportedPlatform`], [`RuntimeError::MissingCustomEngine`],
//!   [`RuntimeError::DownloadFailed`], [`RuntimeError::BindFailed`])
//! - per-call failures that never affect pool health
//!   ([`RuntimeError::NativeCallFailed`], [`RuntimeError::InvalidPayload`])
//! - pool and configuration failures

use std::path::Path;

use thiserror::Error;

/// Top-level runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No engine artifact variant exists for this platform/architecture.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system name as reported by the target.
        os: String,
        /// CPU architecture name as reported by the target.
        arch: String,
    },

    /// A custom library path was configured but nothing exists there.
    ///
    /// Acquisition is never attempted in this case.
    #[error("Custom path provided but library does not exist: {path}")]
    MissingCustomEngine {
        /// The configured path.
        path: String,
    },

    /// Fetching the engine artifact failed.
    #[error("Engine download from {url} failed: {cause}")]
    DownloadFailed {
        /// Source URL of the artifact.
        url: String,
        /// Underlying transport, status or stream cause.
        cause: String,
    },

    /// The artifact exists but is not a loadable engine for this platform/ABI.
    #[error("Failed to bind engine at {path}: {reason}")]
    BindFailed {
        /// Path of the artifact.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// The engine signaled failure for a single call.
    #[error("Native call '{function}' failed: {reason}")]
    NativeCallFailed {
        /// Exported engine function name.
        function: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// A payload could not be marshalled across the call boundary.
    #[error("Invalid payload: {reason}")]
    InvalidPayload {
        /// Description of why the payload was rejected.
        reason: String,
    },

    /// The dispatch pool cannot accept or complete work.
    #[error("Dispatch pool unavailable: {reason}")]
    PoolUnavailable {
        /// Why the pool is unusable.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `UnsupportedPlatform` error.
    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Create a new `MissingCustomEngine` error.
    pub fn missing_custom_engine(path: impl AsRef<Path>) -> Self {
        Self::MissingCustomEngine {
            path: path.as_ref().display().to_string(),
        }
    }

    /// Create a new `DownloadFailed` error.
    pub fn download_failed(url: impl Into<String>, cause: impl ToString) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a new `BindFailed` error.
    pub fn bind_failed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new `NativeCallFailed` error.
    pub fn native_call_failed(function: &'static str, reason: impl Into<String>) -> Self {
        Self::NativeCallFailed {
            function,
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidPayload` error.
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Create a new `PoolUnavailable` error.
    pub fn pool_unavailable(reason: impl Into<String>) -> Self {
        Self::PoolUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error happened while bringing up a worker slot.
    pub fn is_bring_up_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. }
                | Self::MissingCustomEngine { .. }
                | Self::DownloadFailed { .. }
                | Self::BindFailed { .. }
        )
    }

    /// Returns `true` if this error is scoped to a single engine call.
    pub fn is_native_call_failure(&self) -> bool {
        matches!(
            self,
            Self::NativeCallFailed { .. } | Self::InvalidPayload { .. }
        )
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_payload(err.to_string())
    }
}
