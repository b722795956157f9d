//! Dispatch pool and session facade for tls-runtime.
//!
//! - [`TlsClient`]: The six engine operations, by name
//! - [`DispatchPool`]: Fixed set of worker slots fed from one FIFO queue
//! - [`WorkerSlot`]: One worker and the engine it owns
//! - [`payload`]: Typed helpers for the stock engine's JSON documents
//!
//! # Request flow
//!
//! ```text
//! TlsClient::request
//!     │
//!     ▼
//! DispatchPool::submit ──► queue ──► idle worker
//!                                      │ first job: acquire + bind
//!                                      ▼
//!                               spawn_blocking(dispatch)
//!                                      │
//!     ◄──────────── oneshot reply ─────┘
//! ```

pub mod payload;
pub mod pool;
pub mod session;
pub mod slot;

pub use payload::{
    AddCookies, Cookie, CookieQuery, CookiesResponse, DestroyResponse, EnginePayload, Response,
    SessionRef,
};
pub use pool::{DispatchPool, Rejected};
pub use session::{FreeMemoryError, RequestOutcome, TlsClient};
pub use slot::{NativeBringUp, SlotBringUp, SlotMetrics, SlotState, WorkerSlot};
