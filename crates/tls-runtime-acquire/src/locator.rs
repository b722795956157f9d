//! Resolving where the engine artifact lives and where it comes from.
//!
//! [`DependencyLocator`] is a pure function of the platform and the
//! [`EngineOptions`]: it never touches the filesystem or the network.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use tls_runtime_common::{EngineOptions, RuntimeError};

/// Engine release the runtime is built against.
pub const ENGINE_VERSION: &str = "1.7.2";

/// Base URL of the engine's release downloads.
pub const RELEASE_BASE_URL: &str = "https://github.com/bogdanfinn/tls-client/releases/download/";

/// Operating system, architecture and libc of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// `std::env::consts::OS` value.
    pub os: String,
    /// `std::env::consts::ARCH` value.
    pub arch: String,
    /// Linked against musl rather than glibc.
    pub musl: bool,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            musl: cfg!(target_env = "musl"),
        }
    }

    /// Shorthand for tests and cross-resolution.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            musl: false,
        }
    }

    /// Release variant name and library extension.
    fn variant(&self) -> Option<(&'static str, &'static str)> {
        let variant = match (self.os.as_str(), self.arch.as_str(), self.musl) {
            ("linux", "x86_64", false) => ("linux-ubuntu-amd64", "so"),
            ("linux", "x86_64", true) => ("linux-alpine-amd64", "so"),
            ("linux", "aarch64", _) => ("linux-arm64", "so"),
            ("linux", "arm", _) => ("linux-armv7", "so"),
            ("macos", "x86_64", _) => ("darwin-amd64", "dylib"),
            ("macos", "aarch64", _) => ("darwin-arm64", "dylib"),
            ("windows", "x86_64", _) => ("windows-64", "dll"),
            ("windows", "x86", _) => ("windows-32", "dll"),
            _ => return None,
        };
        Some(variant)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)?;
        if self.musl {
            write!(f, " (musl)")?;
        }
        Ok(())
    }
}

/// Where the engine is expected on disk, and where to fetch it from.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineArtifact {
    expected_local_path: PathBuf,
    source_url: Option<Url>,
}

impl EngineArtifact {
    /// An artifact that may be fetched from `source_url` when absent.
    pub fn downloadable(expected_local_path: impl Into<PathBuf>, source_url: Url) -> Self {
        Self {
            expected_local_path: expected_local_path.into(),
            source_url: Some(source_url),
        }
    }

    /// An artifact at a caller-asserted path; never fetched.
    pub fn custom(path: impl Into<PathBuf>) -> Self {
        Self {
            expected_local_path: path.into(),
            source_url: None,
        }
    }

    /// Path the engine is loaded from.
    pub fn expected_local_path(&self) -> &Path {
        &self.expected_local_path
    }

    /// Download source, `None` for custom paths.
    pub fn source_url(&self) -> Option<&Url> {
        self.source_url.as_ref()
    }

    /// Returns `true` if acquisition must not attempt a network fetch.
    pub fn is_custom_path(&self) -> bool {
        self.source_url.is_none()
    }
}

/// Resolves the [`EngineArtifact`] for a platform.
#[derive(Debug, Clone)]
pub struct DependencyLocator {
    platform: Platform,
    version: String,
    base_url: String,
}

impl DependencyLocator {
    /// Locator for `platform`, pinned to [`ENGINE_VERSION`].
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            version: ENGINE_VERSION.to_string(),
            base_url: RELEASE_BASE_URL.to_string(),
        }
    }

    /// Locator for the running platform.
    pub fn for_current_platform() -> Self {
        Self::new(Platform::current())
    }

    /// The platform being resolved for.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Release file name of the engine, e.g. `tls-client-darwin-arm64-1.7.2.dylib`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` if no release variant exists.
    pub fn file_name(&self) -> Result<String, RuntimeError> {
        let (variant, extension) = self.platform.variant().ok_or_else(|| {
            RuntimeError::unsupported_platform(&self.platform.os, &self.platform.arch)
        })?;
        Ok(format!("tls-client-{variant}-{}.{extension}", self.version))
    }

    /// Resolve the artifact for `options`.
    ///
    /// A custom library path short-circuits resolution entirely, so it works
    /// on platforms with no published release.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` if no release variant exists, or
    /// `InvalidConfig` if the release URL cannot be built.
    pub fn resolve(&self, options: &EngineOptions) -> Result<EngineArtifact, RuntimeError> {
        if let Some(path) = &options.custom_library_path {
            return Ok(EngineArtifact::custom(path));
        }

        let file_name = self.file_name()?;
        let directory = options
            .custom_library_download_path
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let source_url = Url::parse(&self.base_url)
            .and_then(|base| base.join(&format!("v{}/{file_name}", self.version)))
            .map_err(|e| RuntimeError::invalid_config(format!("Invalid release URL: {e}")))?;

        Ok(EngineArtifact::downloadable(
            directory.join(file_name),
            source_url,
        ))
    }
}
