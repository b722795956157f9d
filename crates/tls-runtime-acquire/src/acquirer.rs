//! Making sure the engine artifact is on disk.
//!
//! [`EngineAcquirer::ensure_present`] is safe to call before every bring-up:
//! once the artifact exists it is a single existence check.
//!
//! Downloads stream into a uniquely named `*.part` file next to the
//! destination, are flushed and synced, then renamed into place. The
//! destination path therefore only ever holds a complete artifact, and
//! several processes racing on a first run each write their own partial file.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::{Client, Response};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use tls_runtime_common::RuntimeError;

use crate::EngineArtifact;

/// How `ensure_present` satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The artifact was already on disk; nothing was fetched.
    AlreadyPresent,
    /// The artifact was downloaded.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
}

/// Fetches the engine artifact when it is missing.
pub struct EngineAcquirer {
    /// HTTP client used for downloads.
    client: Client,

    /// Serializes downloads issued from this process.
    download_lock: Mutex<()>,
}

impl EngineAcquirer {
    /// Create an acquirer with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("tls-runtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client))
    }

    /// Create with a custom HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            download_lock: Mutex::new(()),
        }
    }

    /// Returns `true` if a file exists at the artifact's expected path.
    pub fn library_exists(artifact: &EngineArtifact) -> bool {
        artifact.expected_local_path().is_file()
    }

    /// Make sure the artifact exists on disk, downloading it if allowed.
    ///
    /// # Errors
    ///
    /// - `MissingCustomEngine` if the artifact is a custom path that does not exist
    /// - `DownloadFailed` on a transport error, a non-success status, or a
    ///   failure while writing the file
    #[instrument(skip(self, artifact), fields(path = %artifact.expected_local_path().display()))]
    pub async fn ensure_present(
        &self,
        artifact: &EngineArtifact,
    ) -> Result<Acquisition, RuntimeError> {
        if Self::library_exists(artifact) {
            return Ok(Acquisition::AlreadyPresent);
        }

        let Some(url) = artifact.source_url() else {
            return Err(RuntimeError::missing_custom_engine(
                artifact.expected_local_path(),
            ));
        };

        let _guard = self.download_lock.lock().await;

        // Another slot may have finished the download while we waited.
        if Self::library_exists(artifact) {
            debug!("Artifact appeared while waiting for download lock");
            return Ok(Acquisition::AlreadyPresent);
        }

        let destination = artifact.expected_local_path();
        info!("Detected missing TLS library");
        info!(url = %url, "Download source");
        info!(destination = %destination.display(), "Download destination");
        info!("Downloading TLS library... This may take a while");

        let start = Instant::now();
        let bytes = self.download(url, destination).await?;

        info!(
            bytes = bytes,
            duration_ms = start.elapsed().as_millis(),
            "Successfully downloaded TLS library"
        );

        Ok(Acquisition::Downloaded { bytes })
    }

    async fn download(&self, url: &Url, destination: &Path) -> Result<u64, RuntimeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RuntimeError::download_failed(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::download_failed(
                url.as_str(),
                format!(
                    "Unexpected response {}",
                    status.canonical_reason().unwrap_or(status.as_str())
                ),
            ));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RuntimeError::download_failed(url.as_str(), e))?;
        }

        let partial = partial_path(destination);
        let result = async {
            let bytes = stream_to_file(response, &partial).await?;
            fs::rename(&partial, destination)
                .await
                .map_err(|e| format!("cannot move download into place: {e}"))?;
            Ok::<_, String>(bytes)
        }
        .await;

        match result {
            Ok(bytes) => Ok(bytes),
            Err(cause) => {
                warn!(cause = %cause, "Download failed; removing partial file");
                // Best effort: the partial name is unique to this attempt.
                if let Err(e) = fs::remove_file(&partial).await {
                    debug!(error = %e, "Partial file not removed");
                }
                Err(RuntimeError::download_failed(url.as_str(), cause))
            }
        }
    }
}

impl std::fmt::Debug for EngineAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAcquirer").finish_non_exhaustive()
    }
}

/// Sibling of `destination` that a single download attempt writes into.
fn partial_path(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map_or_else(|| "engine".into(), |name| name.to_string_lossy());
    destination.with_file_name(format!(".{file_name}.{}.part", Uuid::new_v4().simple()))
}

/// Write the response body to `path`, returning once it is flushed and closed.
async fn stream_to_file(mut response: Response, path: &Path) -> Result<u64, String> {
    let mut file = File::create(path)
        .await
        .map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    let mut written: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| e.to_string())?;
    file.sync_all().await.map_err(|e| e.to_string())?;
    drop(file);

    Ok(written)
}
