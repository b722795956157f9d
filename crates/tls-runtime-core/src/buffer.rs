//! Engine-owned memory handed to the caller.

use tracing::warn;

/// Handle to memory allocated by the engine for a `request` result.
///
/// Ownership moves to the caller when the call returns. The memory lives in
/// the engine's allocator, so it is not reclaimed when this value is dropped:
/// its lifetime ends only when the handle is passed to the engine's
/// `freeMemory` export. That export consumes the handle, so releasing the same
/// buffer twice does not type-check. Forging a handle with [`NativeBuffer::new`]
/// for an id that was already freed is undefined at the engine level.
///
/// Dropping a buffer that was never released logs a leak warning.
#[derive(Debug)]
pub struct NativeBuffer {
    id: String,
    released: bool,
}

impl NativeBuffer {
    /// Wrap the engine-assigned identifier of a returned allocation.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            released: false,
        }
    }

    /// The engine-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Give up the handle for release by the engine.
    ///
    /// Only the code performing the `freeMemory` call should use this.
    pub fn into_handle(mut self) -> String {
        self.released = true;
        std::mem::take(&mut self.id)
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                buffer_id = %self.id,
                "Native buffer dropped without freeMemory; engine memory leaked"
            );
        }
    }
}
