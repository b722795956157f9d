//! Engine binding and call bridge for tls-runtime.
//!
//! This crate owns everything that touches the native engine directly:
//! - [`LoadedEngine`]: The engine artifact bound into the process
//! - [`Engine`]: The call seam implemented by bound engines
//! - [`EngineCall`]: One typed call per exported function
//! - [`NativeBuffer`]: Engine-owned memory that must be released explicitly
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     EngineCall                          │
//! │  (Typed payload per exported function)                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  bridge::dispatch                       │
//! │  - C string marshalling                                 │
//! │  - Null / UTF-8 checks on returned values               │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    LoadedEngine                         │
//! │  (Owned per worker slot)                                │
//! │  - Shared library handle                                │
//! │  - Resolved export table                                │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod binding;
pub mod bridge;
pub mod buffer;
pub mod call;

pub use artifact::ArtifactFormat;
pub use binding::{LIBRARY_NAME, LoadedEngine};
pub use bridge::{Engine, dispatch};
pub use buffer::NativeBuffer;
pub use call::{EngineCall, EngineOutput, ValueKind};
