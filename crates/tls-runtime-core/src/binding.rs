//! Binding the engine artifact into the process.
//!
//! A [`LoadedEngine`] is an owned handle: the shared library plus the six
//! resolved exports. There is no process-wide "current engine"; whoever holds
//! the handle can call into it, and dropping the handle unloads the library
//! reference it holds.

use std::ffi::c_char;
use std::path::{Path, PathBuf};
use std::time::Instant;

use libloading::Library;
use tracing::{debug, info, instrument};

use tls_runtime_common::RuntimeError;

use crate::artifact::{ArtifactFormat, validate_artifact};

/// Logical name the engine is bound under.
pub const LIBRARY_NAME: &str = "tls";

/// `char* f(char*)`
pub(crate) type StringFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
/// `char* f(void)`
pub(crate) type NullaryFn = unsafe extern "C" fn() -> *mut c_char;
/// `void f(char*)`
pub(crate) type VoidFn = unsafe extern "C" fn(*const c_char);

/// Raw function pointers resolved from the library.
///
/// Only valid while the owning [`Library`] is loaded.
#[derive(Clone, Copy)]
pub(crate) struct Exports {
    pub(crate) request: StringFn,
    pub(crate) get_cookies_from_session: StringFn,
    pub(crate) add_cookies_to_session: StringFn,
    pub(crate) free_memory: VoidFn,
    pub(crate) destroy_all: NullaryFn,
    pub(crate) destroy_session: StringFn,
}

impl Exports {
    fn resolve(library: &Library, path: &Path) -> Result<Self, RuntimeError> {
        Ok(Self {
            request: symbol(library, path, "request")?,
            get_cookies_from_session: symbol(library, path, "getCookiesFromSession")?,
            add_cookies_to_session: symbol(library, path, "addCookiesToSession")?,
            free_memory: symbol(library, path, "freeMemory")?,
            destroy_all: symbol(library, path, "destroyAll")?,
            destroy_session: symbol(library, path, "destroySession")?,
        })
    }
}

#[allow(unsafe_code)]
fn symbol<T: Copy>(library: &Library, path: &Path, name: &str) -> Result<T, RuntimeError> {
    // SAFETY: `T` is one of the function pointer aliases above, which mirror the
    // engine's exported C signatures. The pointer is only used while `library`
    // stays loaded, which `LoadedEngine` guarantees by owning both.
    let sym = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|e| RuntimeError::bind_failed(path, format!("missing export '{name}': {e}")))?;
    Ok(*sym)
}

/// The engine bound into the current process.
///
/// Loading the same artifact from several handles is safe: the dynamic loader
/// reference-counts the image, so a second load maps nothing new and leaves
/// the first handle untouched.
///
/// # Example
///
/// ```ignore
/// use tls_runtime_core::{Engine, EngineCall, LoadedEngine};
///
/// let mut engine = LoadedEngine::load("/var/cache/tls-client-linux-ubuntu-amd64-1.7.2.so")?;
/// let out = engine.invoke(EngineCall::DestroyAll)?;
/// ```
pub struct LoadedEngine {
    pub(crate) exports: Exports,
    path: PathBuf,
    format: ArtifactFormat,
    // Declared last so it is dropped after `exports`.
    _library: Library,
}

impl LoadedEngine {
    /// Bind the artifact at `path` and resolve every engine export.
    ///
    /// # Errors
    ///
    /// Returns `BindFailed` if:
    /// - The file is not a shared library for this platform
    /// - The dynamic loader rejects it
    /// - Any of the six exports is missing
    #[allow(unsafe_code)]
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let start = Instant::now();

        let format = validate_artifact(path)?;
        debug!(format = %format, "Artifact header validated");

        // SAFETY: loading runs the library's initializers. The artifact is the
        // engine release resolved for this platform or a path the caller chose.
        let library = unsafe { Library::new(path) }
            .map_err(|e| RuntimeError::bind_failed(path, e.to_string()))?;

        let exports = Exports::resolve(&library, path)?;

        info!(
            library = LIBRARY_NAME,
            duration_us = start.elapsed().as_micros(),
            "Engine bound"
        );

        Ok(Self {
            exports,
            path: path.to_path_buf(),
            format,
            _library: library,
        })
    }

    /// Logical name of the bound library.
    pub fn name(&self) -> &'static str {
        LIBRARY_NAME
    }

    /// Path the artifact was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object format of the loaded artifact.
    pub fn format(&self) -> ArtifactFormat {
        self.format
    }
}

impl std::fmt::Debug for LoadedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedEngine")
            .field("name", &LIBRARY_NAME)
            .field("path", &self.path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
