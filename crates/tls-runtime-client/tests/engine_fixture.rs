//! Calls through a real shared library.
//!
//! `tests/fixtures/engine` is a standalone cdylib exporting the six engine
//! functions. It is built once per run and bound through the normal
//! custom-library path, so these tests cover symbol resolution, C-string
//! marshalling and the `freeMemory` handshake end to end.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

use tls_runtime_client::payload::decode;
use tls_runtime_client::{
    AddCookies, Cookie, CookieQuery, CookiesResponse, EnginePayload, SlotState, TlsClient,
};
use tls_runtime_common::{EngineOptions, RuntimeConfig, RuntimeError};

const URL: &str = "https://example.com/";

fn fixture_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();

    LIBRARY.get_or_init(|| {
        let manifest =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/engine/Cargo.toml");
        let target = Path::new(env!("CARGO_TARGET_TMPDIR")).join("engine-fixture");

        let status = Command::new(env!("CARGO"))
            .args(["build", "--quiet", "--offline", "--manifest-path"])
            .arg(&manifest)
            .arg("--target-dir")
            .arg(&target)
            .status()
            .expect("cargo should start");
        assert!(status.success(), "building the engine fixture failed");

        target.join("debug").join(format!(
            "{}tls_engine_fixture{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        ))
    })
}

fn fixture_client() -> TlsClient {
    let mut config = RuntimeConfig::default();
    config.engine = EngineOptions {
        custom_library_path: Some(fixture_library().to_path_buf()),
        custom_library_download_path: None,
    };
    config.pool.workers = 2;
    TlsClient::new(&config).unwrap()
}

// ============================================================================
// Test: Full round trip
// ============================================================================

#[tokio::test]
async fn test_round_trip_through_shared_library() {
    let client = fixture_client();

    // request returns an id that freeMemory releases.
    let payload = json!({ "sessionId": "lib-1", "requestUrl": URL }).to_string();
    let outcome = assert_ok!(client.request(payload).await);
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.session_id.as_deref(), Some("lib-1"));
    assert_eq!(response.target, URL);
    assert_eq!(outcome.buffer.id(), response.id);
    assert_ok!(client.free_memory(outcome.buffer).await);

    // Cookies added through one call are visible to the next.
    let add = AddCookies {
        session_id: "lib-1".into(),
        url: URL.into(),
        cookies: vec![Cookie::new("token", "abc")],
    }
    .to_payload()
    .unwrap();
    assert_ok!(client.add_cookies_to_session(add).await);

    let query = CookieQuery {
        session_id: "lib-1".into(),
        url: URL.into(),
    }
    .to_payload()
    .unwrap();
    let raw = assert_ok!(client.get_cookies_from_session(query).await);
    let jar = decode::<CookiesResponse>("getCookiesFromSession", &raw)
        .unwrap()
        .cookies;
    assert_eq!(jar.len(), 1);
    assert_eq!(jar[0].name, "token");
    assert_eq!(jar[0].value, "abc");

    // The engine holds no unreleased results.
    let raw = assert_ok!(client.destroy_all().await);
    let summary: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(summary["success"], true);
    assert_eq!(summary["outstanding"], 0);

    client.shutdown().await;
}

// ============================================================================
// Test: Per-call failures
// ============================================================================

#[tokio::test]
async fn test_null_result_fails_call_only() {
    let client = fixture_client();

    let payload = json!({ "sessionId": "lib-missing" }).to_string();
    let err = assert_err!(client.destroy_session(payload).await);

    assert!(matches!(err, RuntimeError::NativeCallFailed { .. }));
    assert!(err.to_string().contains("null pointer"));
    assert!(client.pool().slot_states().contains(&SlotState::Ready));
    assert!(client.pool().is_usable());
}

#[tokio::test]
async fn test_nul_byte_rejected_before_call() {
    let client = fixture_client();

    let err = assert_err!(client.request("a\0b").await);

    assert!(matches!(err, RuntimeError::InvalidPayload { .. }));
    assert!(err.to_string().contains("offset 1"));
    assert!(client.pool().is_usable());
}
