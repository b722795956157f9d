//! Cross-boundary call marshalling.
//!
//! The [`Engine`] trait is the seam between the dispatch layer and whatever
//! answers engine calls. [`LoadedEngine`] implements it by converting payloads
//! to C strings, calling the resolved export, and copying the returned string
//! out of engine memory. [`dispatch`] wraps a single invocation with tracing
//! and timing.

use std::ffi::{CStr, CString, c_char};
use std::time::Instant;

use tracing::{debug, instrument, warn};

use tls_runtime_common::RuntimeError;

use crate::binding::{LoadedEngine, StringFn};
use crate::{EngineCall, EngineOutput};

/// Something that can execute engine calls.
///
/// Implementations are owned by exactly one worker slot and may block.
pub trait Engine: Send {
    /// Perform exactly one call.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` or `InvalidPayload` for failures scoped to
    /// this call.
    fn invoke(&mut self, call: EngineCall) -> Result<EngineOutput, RuntimeError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn invoke(&mut self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        (**self).invoke(call)
    }
}

/// Invoke `call` on `engine`, logging the outcome and duration.
///
/// # Errors
///
/// Propagates the engine's error unchanged. An output whose kind does not
/// match the export's return kind is `NativeCallFailed`.
#[instrument(skip_all, fields(function = call.function_name()))]
pub fn dispatch<E: Engine + ?Sized>(
    engine: &mut E,
    call: EngineCall,
) -> Result<EngineOutput, RuntimeError> {
    let function = call.function_name();
    let expected = call.returns();

    let start = Instant::now();
    let result = engine.invoke(call).and_then(|output| {
        if output.kind() == expected {
            Ok(output)
        } else {
            Err(RuntimeError::native_call_failed(
                function,
                format!("expected a {expected:?} result, engine produced {:?}", output.kind()),
            ))
        }
    });
    let duration = start.elapsed();

    match &result {
        Ok(_) => debug!(duration_us = duration.as_micros(), "Engine call completed"),
        Err(e) => warn!(
            duration_us = duration.as_micros(),
            error = %e,
            "Engine call failed"
        ),
    }

    result
}

impl Engine for LoadedEngine {
    #[allow(unsafe_code)]
    fn invoke(&mut self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        let function = call.function_name();
        let exports = self.exports;

        match call {
            EngineCall::Request(payload) => call_string(function, exports.request, payload),
            EngineCall::GetCookiesFromSession(payload) => {
                call_string(function, exports.get_cookies_from_session, payload)
            }
            EngineCall::AddCookiesToSession(payload) => {
                call_string(function, exports.add_cookies_to_session, payload)
            }
            EngineCall::DestroySession(payload) => {
                call_string(function, exports.destroy_session, payload)
            }
            EngineCall::DestroyAll => {
                // SAFETY: `destroyAll` takes no arguments and returns an
                // engine-owned C string or null.
                let ptr = unsafe { (exports.destroy_all)() };
                read_returned(function, ptr)
            }
            EngineCall::FreeMemory(buffer) => {
                let id = to_c_string(function, buffer.into_handle())?;
                // SAFETY: `id` is a valid NUL-terminated string that outlives the call.
                unsafe { (exports.free_memory)(id.as_ptr()) };
                Ok(EngineOutput::Void)
            }
        }
    }
}

#[allow(unsafe_code)]
fn call_string(
    function: &'static str,
    export: StringFn,
    payload: String,
) -> Result<EngineOutput, RuntimeError> {
    let arg = to_c_string(function, payload)?;
    // SAFETY: `arg` is a valid NUL-terminated string that outlives the call;
    // the engine does not retain the pointer.
    let ptr = unsafe { export(arg.as_ptr()) };
    read_returned(function, ptr)
}

fn to_c_string(function: &'static str, value: String) -> Result<CString, RuntimeError> {
    CString::new(value).map_err(|e| {
        RuntimeError::invalid_payload(format!(
            "{function}: payload contains a NUL byte at offset {}",
            e.nul_position()
        ))
    })
}

/// Copy a returned C string into an owned `String`.
///
/// The memory stays owned by the engine.
#[allow(unsafe_code)]
fn read_returned(function: &'static str, ptr: *mut c_char) -> Result<EngineOutput, RuntimeError> {
    if ptr.is_null() {
        return Err(RuntimeError::native_call_failed(
            function,
            "engine returned a null pointer",
        ));
    }

    // SAFETY: non-null pointers returned by the engine point to NUL-terminated
    // strings that remain valid until released by the engine.
    let value = unsafe { CStr::from_ptr(ptr) };
    value
        .to_str()
        .map(|s| EngineOutput::Value(s.to_owned()))
        .map_err(|e| RuntimeError::native_call_failed(function, format!("non UTF-8 result: {e}")))
}
