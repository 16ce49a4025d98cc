use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unsolicited messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotification {
    /// Partial printer object updates (`notify_status_update`).
    StatusUpdate {
        status: Map<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        eventtime: Option<f64>,
    },

    KlippyReady,

    KlippyShutdown,

    KlippyDisconnected,

    /// One line of console output (`notify_gcode_response`).
    GcodeResponse { line: String },

    FilelistChanged { payload: Value },

    PowerChanged { device: Value },

    UpdateResponse { payload: Value },
}

impl ServerNotification {
    /// The wire method this notification arrives as.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::StatusUpdate { .. } => "notify_status_update",
            Self::KlippyReady => "notify_klippy_ready",
            Self::KlippyShutdown => "notify_klippy_shutdown",
            Self::KlippyDisconnected => "notify_klippy_disconnected",
            Self::GcodeResponse { .. } => "notify_gcode_response",
            Self::FilelistChanged { .. } => "notify_filelist_changed",
            Self::PowerChanged { .. } => "notify_power_changed",
            Self::UpdateResponse { .. } => "notify_update_response",
        }
    }
}
