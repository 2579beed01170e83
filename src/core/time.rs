//! Timestamps, record ids, and the JSON command envelope.

use crate::core::error::DmregError;
use serde_json::Value as JsonValue;
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// Fresh ULID string for users, threads, and audit events.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": ENVELOPE_VERSION,
        "ts": now_epoch_z(),
        "event_id": new_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

/// Envelope for a rejected command. Carries the error code and reason.
pub fn error_envelope(cmd: &str, err: &DmregError) -> JsonValue {
    command_envelope(
        cmd,
        "error",
        serde_json::json!({
            "error": { "code": err.code(), "reason": err.to_string() }
        }),
    )
}
