//! In-memory engine used by the client integration tests.
//!
//! The fake follows the stock engine's JSON conventions and keeps session
//! state process-wide, shared by every slot.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use tls_runtime_client::{SlotBringUp, TlsClient};
use tls_runtime_common::RuntimeError;
use tls_runtime_core::{Engine, EngineCall, EngineOutput};

/// State shared by every fake engine of one test.
#[derive(Debug, Default)]
pub struct FakeState {
    sessions: Mutex<HashMap<String, Vec<Value>>>,
    freed: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        let state = Self::default();
        *state.delay.lock() = delay;
        Arc::new(state)
    }

    pub fn freed(&self) -> Vec<String> {
        self.freed.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        format!("resp-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Engine answering calls from [`FakeState`].
pub struct FakeEngine {
    state: Arc<FakeState>,
}

impl Engine for FakeEngine {
    fn invoke(&mut self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        let state = &self.state;
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *state.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let result = self.answer(call);

        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        state.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

impl FakeEngine {
    fn answer(&self, call: EngineCall) -> Result<EngineOutput, RuntimeError> {
        let function = call.function_name();
        let state = &self.state;

        let document = match call {
            EngineCall::Request(payload) => {
                let payload = parse(function, &payload)?;
                if payload["fail"].as_bool() == Some(true) {
                    return Err(RuntimeError::native_call_failed(function, "engine rejected request"));
                }
                assert!(payload["panic"].as_bool() != Some(true), "engine crashed");
                if payload["omitId"].as_bool() == Some(true) {
                    return Ok(EngineOutput::Value(json!({ "status": 200 }).to_string()));
                }
                json!({
                    "id": state.allocate_id(),
                    "sessionId": payload["sessionId"],
                    "status": 200,
                    "target": payload["requestUrl"],
                    "body": "ok",
                    "headers": {},
                    "cookies": {},
                })
            }
            EngineCall::GetCookiesFromSession(payload) => {
                let session = session_id(function, &parse(function, &payload)?)?;
                let cookies = state.sessions.lock().get(&session).cloned().unwrap_or_default();
                json!({ "id": state.allocate_id(), "cookies": cookies })
            }
            EngineCall::AddCookiesToSession(payload) => {
                let payload = parse(function, &payload)?;
                let session = session_id(function, &payload)?;
                let added = payload["cookies"].as_array().cloned().unwrap_or_default();
                let mut sessions = state.sessions.lock();
                let jar = sessions.entry(session).or_default();
                jar.extend(added);
                json!({ "id": state.allocate_id(), "cookies": jar.clone() })
            }
            EngineCall::FreeMemory(buffer) => {
                state.freed.lock().push(buffer.into_handle());
                return Ok(EngineOutput::Void);
            }
            EngineCall::DestroySession(payload) => {
                let session = session_id(function, &parse(function, &payload)?)?;
                state.sessions.lock().remove(&session);
                json!({ "id": state.allocate_id(), "success": true })
            }
            EngineCall::DestroyAll => {
                state.sessions.lock().clear();
                json!({ "id": state.allocate_id(), "success": true })
            }
        };

        Ok(EngineOutput::Value(document.to_string()))
    }
}

fn parse(function: &'static str, payload: &str) -> Result<Value, RuntimeError> {
    serde_json::from_str(payload)
        .map_err(|e| RuntimeError::native_call_failed(function, format!("bad payload: {e}")))
}

fn session_id(function: &'static str, payload: &Value) -> Result<String, RuntimeError> {
    payload["sessionId"]
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RuntimeError::native_call_failed(function, "missing sessionId"))
}

/// Bring-up producing [`FakeEngine`]s, failing for chosen slots.
pub struct FakeBringUp {
    state: Arc<FakeState>,
    failing: HashSet<usize>,
    attempts: AtomicUsize,
}

impl FakeBringUp {
    pub fn new(state: Arc<FakeState>) -> Self {
        Self {
            state,
            failing: HashSet::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing(state: Arc<FakeState>, slots: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing: slots.into_iter().collect(),
            ..Self::new(state)
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotBringUp for FakeBringUp {
    async fn bring_up(&self, slot: usize) -> Result<Box<dyn Engine>, RuntimeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&slot) {
            return Err(RuntimeError::download_failed(
                "http://127.0.0.1/engine.so",
                "Not Found",
            ));
        }
        Ok(Box::new(FakeEngine {
            state: self.state.clone(),
        }))
    }
}

/// Client over `workers` healthy fake slots.
pub fn fake_client(workers: usize, state: &Arc<FakeState>) -> TlsClient {
    TlsClient::with_bring_up(workers, Arc::new(FakeBringUp::new(state.clone())))
        .expect("client should start")
}

pub fn request_payload(session: &str) -> String {
    json!({ "sessionId": session, "requestUrl": "https://example.com/" }).to_string()
}
