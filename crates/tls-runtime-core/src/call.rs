//! Typed descriptions of engine calls.
//!
//! Each exported engine function is one [`EngineCall`] variant carrying exactly
//! the parameters that function takes, so a call can never be built with the
//! wrong number or kind of arguments.

use std::fmt;

use tls_runtime_common::RuntimeError;

use crate::NativeBuffer;

/// Kind of a value crossing the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// NUL-terminated UTF-8 string.
    String,
    /// No value.
    Void,
}

/// One call into the engine.
///
/// String payloads are engine-defined documents (JSON for the stock engine);
/// session ids travel inside them.
#[derive(Debug)]
pub enum EngineCall {
    /// Issue one HTTP request.
    Request(String),
    /// Read a session's cookie jar.
    GetCookiesFromSession(String),
    /// Merge cookies into a session's cookie jar.
    AddCookiesToSession(String),
    /// Release memory returned by a previous `Request`.
    FreeMemory(NativeBuffer),
    /// Tear down every session.
    DestroyAll,
    /// Tear down one session.
    DestroySession(String),
}

impl EngineCall {
    /// Exported symbol name of the function this call targets.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::GetCookiesFromSession(_) => "getCookiesFromSession",
            Self::AddCookiesToSession(_) => "addCookiesToSession",
            Self::FreeMemory(_) => "freeMemory",
            Self::DestroyAll => "destroyAll",
            Self::DestroySession(_) => "destroySession",
        }
    }

    /// Kind of value the exported function returns.
    ///
    /// `freeMemory` is the only export without a result.
    pub fn returns(&self) -> ValueKind {
        match self {
            Self::FreeMemory(_) => ValueKind::Void,
            _ => ValueKind::String,
        }
    }
}

impl fmt::Display for EngineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Result of a successful engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    /// A string returned by the engine, copied out of engine memory.
    Value(String),
    /// The function returns nothing.
    Void,
}

impl EngineOutput {
    /// Returns the string value.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` if the call produced no value.
    pub fn into_value(self, function: &'static str) -> Result<String, RuntimeError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Void => Err(RuntimeError::native_call_failed(
                function,
                "expected a value, engine returned nothing",
            )),
        }
    }

    /// Returns `true` if the call produced no value.
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Kind of this output.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Value(_) => ValueKind::String,
            Self::Void => ValueKind::Void,
        }
    }
}
