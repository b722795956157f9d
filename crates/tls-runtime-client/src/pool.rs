//! Fixed-size pool of engine workers.
//!
//! Every [`WorkerSlot`] runs in its own long-lived Tokio task. Submissions go
//! into one unbounded FIFO queue; an idle worker takes the next job, brings
//! its engine up on first use, and runs the call on a blocking thread. The
//! submitting task only ever awaits a oneshot reply, so no native call runs on
//! the caller's context.
//!
//! # Failure model
//!
//! - A bring-up failure is delivered to the job that triggered it, and that
//!   worker retires. Other workers keep serving.
//! - Once every worker has retired the queue is closed, and new or
//!   still-queued jobs fail with `PoolUnavailable`.
//! - Per-call failures are returned to their caller and leave the worker
//!   running.
//!
//! A call that never reached an engine is always handed back inside
//! [`Rejected`], so the resources it owns survive the failure.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tls_runtime_common::RuntimeError;
use tls_runtime_core::{EngineCall, EngineOutput};

use crate::slot::{SlotBringUp, SlotMetrics, SlotState, WorkerSlot};

/// A call the pool could not complete.
#[derive(Debug)]
pub struct Rejected {
    /// Why the call failed.
    pub error: RuntimeError,

    /// The call itself, if no engine ever received it.
    pub call: Option<EngineCall>,
}

impl Rejected {
    fn unsent(error: RuntimeError, call: EngineCall) -> Self {
        Self {
            error,
            call: Some(call),
        }
    }

    fn executed(error: RuntimeError) -> Self {
        Self { error, call: None }
    }
}

type Reply = oneshot::Sender<Result<EngineOutput, Rejected>>;

/// A queued call and where to send its result.
struct Job {
    call: EngineCall,
    reply: Reply,
}

type JobQueue = Arc<AsyncMutex<mpsc::UnboundedReceiver<Job>>>;

#[derive(Debug, Clone)]
struct SlotHealth {
    state: SlotState,
    metrics: SlotMetrics,
}

/// Observable state of every slot in a pool.
#[derive(Debug)]
struct PoolHealth {
    slots: Mutex<Vec<SlotHealth>>,
}

impl PoolHealth {
    fn new(workers: usize) -> Self {
        let idle = SlotHealth {
            state: SlotState::Idle,
            metrics: SlotMetrics::default(),
        };
        Self {
            slots: Mutex::new(vec![idle; workers]),
        }
    }

    fn set(&self, slot: usize, state: SlotState) {
        if let Some(entry) = self.slots.lock().get_mut(slot) {
            entry.state = state;
        }
    }

    fn record(&self, slot: &WorkerSlot) {
        if let Some(entry) = self.slots.lock().get_mut(slot.id()) {
            entry.state = slot.state();
            entry.metrics = slot.metrics.clone();
        }
    }

    fn snapshot(&self) -> Vec<SlotState> {
        self.slots.lock().iter().map(|slot| slot.state).collect()
    }

    fn metrics(&self) -> Vec<SlotMetrics> {
        self.slots
            .lock()
            .iter()
            .map(|slot| slot.metrics.clone())
            .collect()
    }

    fn all_failed(&self) -> bool {
        self.slots
            .lock()
            .iter()
            .all(|slot| slot.state == SlotState::Failed)
    }
}

/// Dispatch pool of worker slots.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tls_runtime_client::{DispatchPool, NativeBringUp};
/// use tls_runtime_common::EngineOptions;
/// use tls_runtime_core::EngineCall;
///
/// let bring_up = Arc::new(NativeBringUp::from_options(&EngineOptions::default())?);
/// let pool = DispatchPool::new(4, bring_up)?;
/// let out = pool.submit(EngineCall::DestroyAll).await?;
/// ```
pub struct DispatchPool {
    sender: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    health: Arc<PoolHealth>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl DispatchPool {
    /// Start `workers` worker tasks on the current Tokio runtime.
    ///
    /// Engines are not brought up until each worker receives its first job.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `workers` is zero or no Tokio runtime is
    /// running.
    pub fn new(workers: usize, bring_up: Arc<dyn SlotBringUp>) -> Result<Self, RuntimeError> {
        if workers == 0 {
            return Err(RuntimeError::invalid_config(
                "pool needs at least one worker",
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            RuntimeError::invalid_config(format!("DispatchPool requires a Tokio runtime: {e}"))
        })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: JobQueue = Arc::new(AsyncMutex::new(receiver));
        let health = Arc::new(PoolHealth::new(workers));

        let handles = (0..workers)
            .map(|id| {
                runtime.spawn(run_worker(
                    WorkerSlot::new(id),
                    queue.clone(),
                    bring_up.clone(),
                    health.clone(),
                ))
            })
            .collect();

        info!(workers, "Dispatch pool started");

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            health,
            workers: Mutex::new(handles),
            size: workers,
        })
    }

    /// Queue `call` and wait for a worker to execute it.
    ///
    /// A call that fails before reaching an engine is dropped. Use
    /// [`DispatchPool::try_submit`] to get it back.
    ///
    /// # Errors
    ///
    /// - The bring-up error of the slot that picked the job, if bring-up failed
    /// - The engine's error for this call
    /// - `PoolUnavailable` if the pool is closed, every slot has failed, or
    ///   the slot running the call lost its engine
    pub async fn submit(&self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        self.try_submit(call).await.map_err(|rejected| rejected.error)
    }

    /// Queue `call` and wait for a worker to execute it, handing the call
    /// back if it never reached an engine.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchPool::submit`], wrapped in [`Rejected`].
    pub async fn try_submit(&self, call: EngineCall) -> Result<EngineOutput, Rejected> {
        let (reply, response) = oneshot::channel();
        {
            let sender = self.sender.read();
            let Some(sender) = sender.as_ref() else {
                return Err(Rejected::unsent(
                    RuntimeError::pool_unavailable("pool is closed"),
                    call,
                ));
            };
            if let Err(mpsc::error::SendError(job)) = sender.send(Job { call, reply }) {
                return Err(Rejected::unsent(
                    RuntimeError::pool_unavailable("every worker slot has failed"),
                    job.call,
                ));
            }
        }

        response.await.unwrap_or_else(|_| {
            Err(Rejected::executed(RuntimeError::pool_unavailable(
                "worker slot exited before completing the call",
            )))
        })
    }

    /// Number of worker slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// State of each slot, indexed by slot id.
    pub fn slot_states(&self) -> Vec<SlotState> {
        self.health.snapshot()
    }

    /// Call metrics of each slot, indexed by slot id.
    pub fn slot_metrics(&self) -> Vec<SlotMetrics> {
        self.health.metrics()
    }

    /// Returns `false` once every slot has failed or the pool is closed.
    pub fn is_usable(&self) -> bool {
        !self.health.all_failed() && self.sender.read().is_some()
    }

    /// Stop accepting work. Already queued jobs still run.
    pub fn close(&self) {
        if self.sender.write().take().is_some() {
            debug!("Dispatch pool closed");
        }
    }

    /// Close the pool and wait for every worker to finish.
    pub async fn shutdown(&self) {
        self.close();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Dispatch pool shut down");
    }
}

impl std::fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPool")
            .field("size", &self.size)
            .field("slots", &self.health.snapshot())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    mut slot: WorkerSlot,
    queue: JobQueue,
    bring_up: Arc<dyn SlotBringUp>,
    health: Arc<PoolHealth>,
) {
    let id = slot.id();

    loop {
        // The queue lock is FIFO, so idle workers take jobs in turn.
        let job = queue.lock().await.recv().await;
        let Some(Job { call, reply }) = job else {
            debug!(slot = id, "Queue closed; worker exiting");
            break;
        };

        if let Err(e) = slot.ensure_ready(bring_up.as_ref()).await {
            health.set(id, SlotState::Failed);
            error!(slot = id, error = %e, "Worker slot bring-up failed");
            let _ = reply.send(Err(Rejected::unsent(e, call)));
            break;
        }
        health.set(id, SlotState::Ready);

        let result = slot.execute(call).await.map_err(Rejected::executed);
        health.record(&slot);

        let lost = slot.state() == SlotState::Failed;
        if lost {
            error!(slot = id, "Worker slot lost its engine");
        }
        // The caller may have stopped waiting; that is not an error here.
        let _ = reply.send(result);

        if lost {
            break;
        }
    }

    if health.all_failed() {
        error!("Every worker slot has failed; pool is unusable");
        reject_queued(&queue).await;
    }
}

/// Close the queue and hand every waiting call back to its submitter.
async fn reject_queued(queue: &JobQueue) {
    let mut receiver = queue.lock().await;
    receiver.close();

    while let Ok(Job { call, reply }) = receiver.try_recv() {
        let _ = reply.send(Err(Rejected::unsent(
            RuntimeError::pool_unavailable("every worker slot has failed"),
            call,
        )));
    }
}
