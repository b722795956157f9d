//! Typed payloads for the stock engine's JSON conventions.
//!
//! The facade accepts and returns raw engine documents; these types are an
//! optional convenience for building and reading them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tls_runtime_common::RuntimeError;

/// A value that can be sent as an engine payload.
pub trait EnginePayload: Serialize {
    /// Encode as the engine's JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if serialization fails.
    fn to_payload(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Names a session, for `destroySession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

impl EnginePayload for SessionRef {}

/// Reads a session's cookies for a URL, for `getCookiesFromSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieQuery {
    pub session_id: String,
    pub url: String,
}

impl EnginePayload for CookieQuery {}

/// Adds cookies to a session for a URL, for `addCookiesToSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCookies {
    pub session_id: String,
    pub url: String,
    pub cookies: Vec<Cookie>,
}

impl EnginePayload for AddCookies {}

/// One cookie as the engine encodes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix timestamp in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// A cookie with only a name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }
}

/// Result document of `request`.
///
/// `id` names the engine allocation that must be released with `freeMemory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// HTTP status, `0` when the engine could not complete the request.
    pub status: u16,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub used_protocol: Option<String>,
}

impl Response {
    /// Returns `true` if the engine reported a transport-level failure.
    ///
    /// The engine puts the error message in `body` in that case.
    pub fn is_engine_error(&self) -> bool {
        self.status == 0
    }
}

/// Result document of the cookie operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CookiesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}

/// Result document of `destroySession` and `destroyAll`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DestroyResponse {
    #[serde(default)]
    pub id: String,
    pub success: bool,
}

/// Decode an engine result document.
///
/// # Errors
///
/// Returns `NativeCallFailed` naming `function` if the document does not match `T`.
pub fn decode<T: for<'de> Deserialize<'de>>(
    function: &'static str,
    raw: &str,
) -> Result<T, RuntimeError> {
    serde_json::from_str(raw).map_err(|e| {
        RuntimeError::native_call_failed(function, format!("unexpected result document: {e}"))
    })
}
