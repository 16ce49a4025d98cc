//! Decoding of server push notifications.
//!
//! Moonraker sends notification params as a positional array. The first
//! element carries the payload; `notify_status_update` adds the event time
//! as a second element.

use serde_json::{Map, Value};
use tracing::debug;

use lunadeck_types::ServerNotification;

fn first(params: Option<&Value>) -> Value {
    match params {
        Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Turn a `(method, params)` pair into a typed notification.
///
/// Returns `None` for methods this client does not handle, and for status
/// updates whose payload is not an object.
#[must_use]
pub fn notification_to_event(method: &str, params: Option<&Value>) -> Option<ServerNotification> {
    let event = match method {
        "notify_status_update" => {
            let status = match first(params) {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    debug!("Ignoring status update with non-object payload: {other}");
                    return None;
                }
            };
            let eventtime = match params {
                Some(Value::Array(items)) => items.get(1).and_then(Value::as_f64),
                _ => None,
            };
            ServerNotification::StatusUpdate { status, eventtime }
        }
        "notify_klippy_ready" => ServerNotification::KlippyReady,
        "notify_klippy_shutdown" => ServerNotification::KlippyShutdown,
        "notify_klippy_disconnected" => ServerNotification::KlippyDisconnected,
        "notify_gcode_response" => {
            let line = match first(params) {
                Value::String(line) => line,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            ServerNotification::GcodeResponse { line }
        }
        "notify_filelist_changed" => ServerNotification::FilelistChanged {
            payload: first(params),
        },
        "notify_power_changed" => ServerNotification::PowerChanged {
            device: first(params),
        },
        "notify_update_response" => ServerNotification::UpdateResponse {
            payload: first(params),
        },
        _ => {
            debug!("Unhandled notification: {method}");
            return None;
        }
    };
    Some(event)
}
