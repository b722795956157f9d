//! Minimal shared library exposing the six TLS engine exports.
//!
//! Sessions are cookie lists keyed by `sessionId`. Every `request` result
//! stays allocated until `freeMemory` releases it by id, and `destroyAll`
//! reports how many are still outstanding.

#![allow(non_snake_case)]

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
static STATE: Mutex<State> = Mutex::new(State {
    outstanding: Vec::new(),
    sessions: Vec::new(),
});

struct State {
    /// Response id and the address handed out for it.
    outstanding: Vec<(String, usize)>,
    /// Session id and the raw cookie objects added to it.
    sessions: Vec<(String, Vec<String>)>,
}

fn state() -> MutexGuard<'static, State> {
    STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_id(prefix: &str) -> String {
    format!("{prefix}{}", NEXT_ID.fetch_add(1, Ordering::SeqCst))
}

fn read(arg: *const c_char) -> String {
    if arg.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(arg) }.to_string_lossy().into_owned()
}

fn give(text: String) -> *mut c_char {
    CString::new(text).map_or(ptr::null_mut(), CString::into_raw)
}

/// Value of a string field, without unescaping.
fn field<'a>(doc: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("\"{name}\":\"");
    let start = doc.find(&key)? + key.len();
    let len = doc[start..].find('"')?;
    Some(&doc[start..start + len])
}

/// Contents of the `cookies` array.
fn cookie_list(doc: &str) -> Option<&str> {
    let rest = &doc[doc.find("\"cookies\":")?..];
    let open = rest.find('[')?;
    let close = rest.rfind(']')?;
    let inner = rest.get(open + 1..close)?.trim();
    (!inner.is_empty()).then_some(inner)
}

fn cookies_document(jar: &[String]) -> String {
    format!(r#"{{"id":"{}","cookies":[{}]}}"#, next_id("c"), jar.join(","))
}

#[no_mangle]
pub extern "C" fn request(payload: *const c_char) -> *mut c_char {
    let payload = read(payload);
    let session = field(&payload, "sessionId").unwrap_or_default();
    let target = field(&payload, "requestUrl").unwrap_or_default();
    let id = next_id("r");

    let document = format!(
        r#"{{"id":"{id}","sessionId":"{session}","status":200,"target":"{target}","body":"{}","headers":{{}},"cookies":{{}}}}"#,
        payload.len()
    );
    let out = give(document);
    state().outstanding.push((id, out as usize));
    out
}

#[no_mangle]
pub extern "C" fn getCookiesFromSession(payload: *const c_char) -> *mut c_char {
    let payload = read(payload);
    let session = field(&payload, "sessionId").unwrap_or_default();

    let state = state();
    let jar = state
        .sessions
        .iter()
        .find(|(id, _)| id == session)
        .map(|(_, jar)| jar.as_slice())
        .unwrap_or_default();
    give(cookies_document(jar))
}

#[no_mangle]
pub extern "C" fn addCookiesToSession(payload: *const c_char) -> *mut c_char {
    let payload = read(payload);
    let Some(session) = field(&payload, "sessionId") else {
        return ptr::null_mut();
    };

    let mut state = state();
    let index = match state.sessions.iter().position(|(id, _)| id == session) {
        Some(index) => index,
        None => {
            state.sessions.push((session.to_owned(), Vec::new()));
            state.sessions.len() - 1
        }
    };
    let jar = &mut state.sessions[index].1;
    if let Some(added) = cookie_list(&payload) {
        jar.push(added.to_owned());
    }
    give(cookies_document(jar))
}

#[no_mangle]
pub extern "C" fn freeMemory(id: *const c_char) {
    let id = read(id);
    let mut state = state();
    if let Some(index) = state.outstanding.iter().position(|(key, _)| *key == id) {
        let (_, address) = state.outstanding.swap_remove(index);
        drop(unsafe { CString::from_raw(address as *mut c_char) });
    }
}

#[no_mangle]
pub extern "C" fn destroyAll() -> *mut c_char {
    let mut state = state();
    state.sessions.clear();
    give(format!(
        r#"{{"id":"{}","success":true,"outstanding":{}}}"#,
        next_id("d"),
        state.outstanding.len()
    ))
}

#[no_mangle]
pub extern "C" fn destroySession(payload: *const c_char) -> *mut c_char {
    let payload = read(payload);
    let session = field(&payload, "sessionId").unwrap_or_default();

    let mut state = state();
    let Some(index) = state.sessions.iter().position(|(id, _)| id == session) else {
        return ptr::null_mut();
    };
    state.sessions.remove(index);
    give(format!(r#"{{"id":"{}","success":true}}"#, next_id("d")))
}
