//! Session operations through the client facade.

mod common;

use tokio_test::assert_ok;

use tls_runtime_client::payload::decode;
use tls_runtime_client::{
    AddCookies, Cookie, CookieQuery, CookiesResponse, DestroyResponse, EnginePayload, SessionRef,
    TlsClient,
};

use common::{FakeState, fake_client, request_payload};

const URL: &str = "https://example.com/";

async fn add_cookie(client: &TlsClient, session: &str, name: &str, value: &str) {
    let payload = AddCookies {
        session_id: session.into(),
        url: URL.into(),
        cookies: vec![Cookie::new(name, value)],
    }
    .to_payload()
    .unwrap();
    assert_ok!(client.add_cookies_to_session(payload).await);
}

async fn cookies(client: &TlsClient, session: &str) -> Vec<Cookie> {
    let payload = CookieQuery {
        session_id: session.into(),
        url: URL.into(),
    }
    .to_payload()
    .unwrap();
    let raw = assert_ok!(client.get_cookies_from_session(payload).await);
    decode::<CookiesResponse>("getCookiesFromSession", &raw)
        .unwrap()
        .cookies
}

// ============================================================================
// Test: Buffer lifecycle
// ============================================================================

#[tokio::test]
async fn test_free_memory_releases_request_buffer() {
    let state = FakeState::new();
    let client = fake_client(2, &state);

    let outcome = assert_ok!(client.request(request_payload("s-1")).await);
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.session_id.as_deref(), Some("s-1"));
    assert_eq!(outcome.buffer.id(), response.id);

    let id = outcome.buffer.id().to_owned();
    assert_ok!(client.free_memory(outcome.buffer).await);

    assert_eq!(state.freed(), vec![id]);
}

// ============================================================================
// Test: Session isolation
// ============================================================================

#[tokio::test]
async fn test_sessions_do_not_share_cookies() {
    let state = FakeState::new();
    let client = fake_client(3, &state);

    add_cookie(&client, "alice", "token", "a-1").await;
    add_cookie(&client, "bob", "token", "b-1").await;
    add_cookie(&client, "alice", "theme", "dark").await;

    let alice = cookies(&client, "alice").await;
    let bob = cookies(&client, "bob").await;

    assert_eq!(
        alice,
        vec![Cookie::new("token", "a-1"), Cookie::new("theme", "dark")]
    );
    assert_eq!(bob, vec![Cookie::new("token", "b-1")]);
}

#[tokio::test]
async fn test_unknown_session_has_no_cookies() {
    let state = FakeState::new();
    let client = fake_client(1, &state);

    assert!(cookies(&client, "never-used").await.is_empty());
}

// ============================================================================
// Test: Teardown
// ============================================================================

#[tokio::test]
async fn test_destroy_session_resets_state() {
    let state = FakeState::new();
    let client = fake_client(2, &state);

    add_cookie(&client, "alice", "token", "a-1").await;
    add_cookie(&client, "bob", "token", "b-1").await;

    let payload = SessionRef {
        session_id: "alice".into(),
    }
    .to_payload()
    .unwrap();
    let raw = assert_ok!(client.destroy_session(payload).await);
    assert!(decode::<DestroyResponse>("destroySession", &raw).unwrap().success);

    assert!(cookies(&client, "alice").await.is_empty());
    assert_eq!(cookies(&client, "bob").await, vec![Cookie::new("token", "b-1")]);
}

#[tokio::test]
async fn test_destroy_all_resets_every_session() {
    let state = FakeState::new();
    let client = fake_client(2, &state);

    add_cookie(&client, "alice", "token", "a-1").await;
    add_cookie(&client, "bob", "token", "b-1").await;

    let raw = assert_ok!(client.destroy_all().await);
    assert!(decode::<DestroyResponse>("destroyAll", &raw).unwrap().success);

    assert!(cookies(&client, "alice").await.is_empty());
    assert!(cookies(&client, "bob").await.is_empty());
}
