//! Key namespacing for the cross-worker store (§6).

pub fn call_record(call_id: &str) -> String {
    format!("call:{}", call_id)
}

pub fn playback_set(call_id: &str) -> String {
    format!("playbacks:{}", call_id)
}

pub fn session_ready(call_id: &str) -> String {
    format!("session_ready:{}", call_id)
}

pub fn flag(call_id: &str, name: &str) -> String {
    format!("flag:{}:{}", call_id, name)
}
