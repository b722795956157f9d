//! Worker slots and their bring-up.
//!
//! A [`WorkerSlot`] owns at most one engine. The engine is created lazily by a
//! [`SlotBringUp`] the first time the slot receives work, and from then on is
//! moved onto a blocking thread for each call and back into the slot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinError;
use tracing::{debug, info, instrument};

use tls_runtime_acquire::{DependencyLocator, EngineAcquirer, EngineArtifact};
use tls_runtime_common::{EngineOptions, RuntimeError};
use tls_runtime_core::{Engine, EngineCall, EngineOutput, LoadedEngine, dispatch};

/// Produces the engine a worker slot will own.
#[async_trait]
pub trait SlotBringUp: Send + Sync + 'static {
    /// Create the engine for `slot`.
    ///
    /// # Errors
    ///
    /// Returns a bring-up error; the slot is retired and the error is
    /// delivered to the request that triggered bring-up.
    async fn bring_up(&self, slot: usize) -> Result<Box<dyn Engine>, RuntimeError>;
}

/// Bring-up against the real engine: acquire the artifact, then bind it.
#[derive(Debug, Clone)]
pub struct NativeBringUp {
    artifact: EngineArtifact,
    acquirer: Arc<EngineAcquirer>,
}

impl NativeBringUp {
    /// Bring-up for an already resolved artifact.
    pub fn new(artifact: EngineArtifact, acquirer: Arc<EngineAcquirer>) -> Self {
        Self { artifact, acquirer }
    }

    /// Resolve the artifact for the running platform.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlatform` when no release exists for this platform
    /// and no custom path was given, or `InvalidConfig` if the HTTP client
    /// cannot be built.
    pub fn from_options(options: &EngineOptions) -> Result<Self, RuntimeError> {
        let artifact = DependencyLocator::for_current_platform().resolve(options)?;
        Ok(Self::new(artifact, Arc::new(EngineAcquirer::new()?)))
    }

    /// The artifact this bring-up loads.
    pub fn artifact(&self) -> &EngineArtifact {
        &self.artifact
    }
}

#[async_trait]
impl SlotBringUp for NativeBringUp {
    #[instrument(skip(self))]
    async fn bring_up(&self, slot: usize) -> Result<Box<dyn Engine>, RuntimeError> {
        let acquisition = self.acquirer.ensure_present(&self.artifact).await?;
        debug!(?acquisition, "Artifact present");

        let path: PathBuf = self.artifact.expected_local_path().to_path_buf();
        let engine = tokio::task::spawn_blocking({
            let path = path.clone();
            move || LoadedEngine::load(path)
        })
        .await
        .map_err(|e| RuntimeError::bind_failed(&path, format!("loader task failed: {e}")))??;

        info!(
            slot,
            library = engine.name(),
            format = %engine.format(),
            path = %engine.path().display(),
            "Engine bound for slot"
        );
        Ok(Box::new(engine))
    }
}

/// Lifecycle state of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No work received yet; engine not brought up.
    Idle,
    /// Engine bound and serving calls.
    Ready,
    /// Bring-up failed or the engine was lost; the slot no longer serves.
    Failed,
}

/// Per-slot call metrics.
#[derive(Debug, Clone, Default)]
pub struct SlotMetrics {
    /// Calls completed, successful or not.
    pub calls: u64,

    /// Calls the engine reported as failed.
    pub failures: u64,

    /// Duration of the most recent call.
    pub last_duration: Option<Duration>,
}

/// One worker of the dispatch pool.
pub struct WorkerSlot {
    id: usize,
    engine: Option<Box<dyn Engine>>,
    state: SlotState,
    pub metrics: SlotMetrics,
}

impl WorkerSlot {
    /// Create an idle slot.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            engine: None,
            state: SlotState::Idle,
            metrics: SlotMetrics::default(),
        }
    }

    /// Slot index within its pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Bring the engine up if this is the slot's first use.
    ///
    /// # Errors
    ///
    /// Returns the bring-up error and marks the slot failed. A failed slot
    /// is never brought up again.
    pub async fn ensure_ready(&mut self, bring_up: &dyn SlotBringUp) -> Result<(), RuntimeError> {
        match self.state {
            SlotState::Ready => Ok(()),
            SlotState::Failed => Err(RuntimeError::pool_unavailable(format!(
                "worker slot {} has failed",
                self.id
            ))),
            SlotState::Idle => match bring_up.bring_up(self.id).await {
                Ok(engine) => {
                    self.engine = Some(engine);
                    self.state = SlotState::Ready;
                    info!(slot = self.id, "Worker slot ready");
                    Ok(())
                }
                Err(e) => {
                    self.state = SlotState::Failed;
                    Err(e)
                }
            },
        }
    }

    /// Run one call on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for this call. If the call panics the
    /// engine is lost, the slot becomes [`SlotState::Failed`], and the error
    /// is `PoolUnavailable`.
    pub async fn execute(&mut self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        let function = call.function_name();
        let Some(mut engine) = self.engine.take() else {
            return Err(RuntimeError::pool_unavailable(format!(
                "worker slot {} has no bound engine",
                self.id
            )));
        };

        let start = std::time::Instant::now();
        let joined = tokio::task::spawn_blocking(move || {
            let output = dispatch(&mut engine, call);
            (engine, output)
        })
        .await;

        self.metrics.calls += 1;
        self.metrics.last_duration = Some(start.elapsed());

        match joined {
            Ok((engine, output)) => {
                self.engine = Some(engine);
                if output.is_err() {
                    self.metrics.failures += 1;
                }
                output
            }
            Err(e) => {
                self.state = SlotState::Failed;
                self.metrics.failures += 1;
                Err(RuntimeError::pool_unavailable(format!(
                    "worker slot {} lost its engine during '{function}': {}",
                    self.id,
                    abort_cause(e)
                )))
            }
        }
    }
}

/// Panic message of an aborted blocking call, when there is one.
fn abort_cause(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "engine call panicked".to_owned()),
        Err(err) => err.to_string(),
    }
}

impl std::fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
