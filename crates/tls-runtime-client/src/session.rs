//! The public operation surface.
//!
//! [`TlsClient`] exposes the engine's six operations by name. Every call is
//! submitted through the [`DispatchPool`]; none runs on the caller's task.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use tls_runtime_common::{RuntimeConfig, RuntimeError};
use tls_runtime_core::{EngineCall, NativeBuffer};

use crate::payload::{self, Response};
use crate::pool::{DispatchPool, Rejected};
use crate::slot::{NativeBringUp, SlotBringUp};

/// Result of a `request` call.
///
/// `buffer` owns the engine memory behind `body` and must be handed to
/// [`TlsClient::free_memory`] exactly once.
#[derive(Debug)]
pub struct RequestOutcome {
    /// Engine-encoded result document.
    pub body: String,
    /// Engine allocation backing the result.
    pub buffer: NativeBuffer,
}

impl RequestOutcome {
    /// Decode `body` as the stock engine's response document.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` if the document is not a response.
    pub fn response(&self) -> Result<Response, RuntimeError> {
        payload::decode("request", &self.body)
    }
}

/// A failed `freeMemory` call.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct FreeMemoryError {
    /// Why the release failed.
    pub source: RuntimeError,

    /// The buffer, when the engine never received it. It is still owed a
    /// `freeMemory` call.
    pub buffer: Option<NativeBuffer>,
}

impl FreeMemoryError {
    /// Take back the unreleased buffer, if the engine never received it.
    pub fn into_buffer(self) -> Option<NativeBuffer> {
        self.buffer
    }
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
}

/// Client for the TLS engine.
///
/// Cloning is cheap; clones share one pool.
///
/// # Example
///
/// ```ignore
/// use tls_runtime_client::TlsClient;
/// use tls_runtime_common::RuntimeConfig;
///
/// let client = TlsClient::new(&RuntimeConfig::default())?;
/// let outcome = client.request(r#"{"sessionId":"s-1","requestUrl":"https://example.com"}"#).await?;
/// println!("{}", outcome.body);
/// client.free_memory(outcome.buffer).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TlsClient {
    pool: Arc<DispatchPool>,
}

impl TlsClient {
    /// Start a client backed by the real engine.
    ///
    /// Artifact resolution happens here; download and binding happen per
    /// slot on first use.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` if no engine release exists for this
    /// platform, or `InvalidConfig` for a bad pool size or a missing runtime.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let bring_up = NativeBringUp::from_options(&config.engine)?;
        debug!(
            path = %bring_up.artifact().expected_local_path().display(),
            custom = bring_up.artifact().is_custom_path(),
            "Engine artifact resolved"
        );
        Self::with_bring_up(config.pool.workers, Arc::new(bring_up))
    }

    /// Start a client whose slots are brought up by `bring_up`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad pool size or a missing runtime.
    pub fn with_bring_up(
        workers: usize,
        bring_up: Arc<dyn SlotBringUp>,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            pool: Arc::new(DispatchPool::new(workers, bring_up)?),
        })
    }

    /// The pool behind this client.
    pub fn pool(&self) -> &DispatchPool {
        &self.pool
    }

    /// Issue one HTTP request.
    ///
    /// # Errors
    ///
    /// Returns a bring-up error, `NativeCallFailed` (including a result
    /// without an `id`), `InvalidPayload`, or `PoolUnavailable`.
    #[instrument(skip_all)]
    pub async fn request(&self, payload: impl Into<String>) -> Result<RequestOutcome, RuntimeError> {
        let call = EngineCall::Request(payload.into());
        let body = self.pool.submit(call).await?.into_value("request")?;
        let Envelope { id } = payload::decode("request", &body)?;

        Ok(RequestOutcome {
            body,
            buffer: NativeBuffer::new(id),
        })
    }

    /// Read the cookies a session holds.
    ///
    /// # Errors
    ///
    /// See [`TlsClient::request`].
    pub async fn get_cookies_from_session(
        &self,
        payload: impl Into<String>,
    ) -> Result<String, RuntimeError> {
        self.value(EngineCall::GetCookiesFromSession(payload.into()))
            .await
    }

    /// Merge cookies into a session.
    ///
    /// # Errors
    ///
    /// See [`TlsClient::request`].
    pub async fn add_cookies_to_session(
        &self,
        payload: impl Into<String>,
    ) -> Result<String, RuntimeError> {
        self.value(EngineCall::AddCookiesToSession(payload.into()))
            .await
    }

    /// Release the engine memory behind a `request` result.
    ///
    /// # Errors
    ///
    /// Returns [`FreeMemoryError`]. If the call never reached an engine, for
    /// example because the slot that picked it failed bring-up, the error
    /// hands the buffer back so the release can be retried.
    pub async fn free_memory(&self, buffer: NativeBuffer) -> Result<(), FreeMemoryError> {
        match self.pool.try_submit(EngineCall::FreeMemory(buffer)).await {
            Ok(_) => Ok(()),
            Err(Rejected { error, call }) => {
                let buffer = match call {
                    Some(EngineCall::FreeMemory(buffer)) => Some(buffer),
                    _ => None,
                };
                if let Some(buffer) = &buffer {
                    warn!(
                        buffer_id = %buffer.id(),
                        error = %error,
                        "freeMemory not delivered; buffer returned to caller"
                    );
                }
                Err(FreeMemoryError {
                    source: error,
                    buffer,
                })
            }
        }
    }

    /// Tear down every session. Their ids must not be used afterwards.
    ///
    /// # Errors
    ///
    /// See [`TlsClient::request`].
    pub async fn destroy_all(&self) -> Result<String, RuntimeError> {
        self.value(EngineCall::DestroyAll).await
    }

    /// Tear down one session. Its id must not be used afterwards.
    ///
    /// # Errors
    ///
    /// See [`TlsClient::request`].
    pub async fn destroy_session(&self, payload: impl Into<String>) -> Result<String, RuntimeError> {
        self.value(EngineCall::DestroySession(payload.into())).await
    }

    /// Stop accepting calls and wait for queued ones to finish.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    async fn value(&self, call: EngineCall) -> Result<String, RuntimeError> {
        let function = call.function_name();
        self.pool.submit(call).await?.into_value(function)
    }
}
