//! The state container.
//!
//! State lives behind a `watch` channel as an `Arc<State>` snapshot. Every
//! operation runs against a private copy of the current snapshot and
//! publishes the result in one step, so subscribers never observe a half
//! applied change.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use lunadeck_rpc::{DispatchTarget, InboundEvent, ServerNotification, WaitRegistry};
use lunadeck_types::{ApiConfig, InstanceName, LocalConfig, Macro, TempPreset};

use crate::Result;
use crate::config::{ConfigState, InstancesInit};
use crate::socket::SocketState;
use crate::storage::Storage;
use crate::utils::now_millis;

#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub config: ConfigState,
    pub socket: SocketState,
}

impl State {
    /// Macros not hidden by the dashboard config.
    #[must_use]
    pub fn visible_macros(&self) -> Vec<String> {
        self.socket
            .visible_macros(&self.config.file_config.dashboard.hidden_macros)
    }
}

pub struct Store {
    tx: watch::Sender<Arc<State>>,
    storage: Arc<dyn Storage>,
    waits: WaitRegistry,
}

impl Store {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, waits: WaitRegistry) -> Self {
        let (tx, _) = watch::channel(Arc::new(State::default()));
        Self { tx, storage, waits }
    }

    /// Receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<State>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<State> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn waits(&self) -> &WaitRegistry {
        &self.waits
    }

    fn update(&self, f: impl FnOnce(&mut State)) {
        self.tx.send_modify(|state| f(Arc::make_mut(state)));
    }

    /// Like `update`, but subscribers are only notified when `f` succeeds.
    fn try_update(&self, f: impl FnOnce(&mut State) -> Result<()>) -> Result<()> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            let mut next = State::clone(state);
            outcome = f(&mut next);
            if outcome.is_ok() {
                *state = Arc::new(next);
                true
            } else {
                false
            }
        });
        outcome
    }

    // Config slice

    pub fn reset(&self) {
        self.update(|state| state.config.reset());
    }

    /// # Errors
    ///
    /// Returns an error if the current file config cannot be serialized.
    pub fn init_file(&self, payload: Option<&Value>) -> Result<()> {
        self.try_update(|state| state.config.init_file(payload))
    }

    /// # Errors
    ///
    /// Returns an error if the stored local config cannot be read.
    pub fn init_local(&self) -> Result<()> {
        self.try_update(|state| state.config.init_local(&*self.storage))
    }

    pub fn init_api_config(&self, api: &ApiConfig) {
        self.update(|state| state.config.init_api_config(api));
    }

    /// # Errors
    ///
    /// Returns an error if the instance list cannot be read or written.
    pub fn init_instances(&self, payload: &InstancesInit) -> Result<()> {
        self.try_update(|state| state.config.init_instances(payload, &*self.storage))
    }

    /// # Errors
    ///
    /// Returns an error if the instance list cannot be written.
    pub fn update_instance_name(&self, payload: &InstanceName) -> Result<()> {
        self.try_update(|state| state.config.update_instance_name(payload, &*self.storage))
    }

    /// # Errors
    ///
    /// Returns an error if the instance list cannot be written.
    pub fn remove_instance(&self, api_url: &str) -> Result<()> {
        self.try_update(|state| state.config.remove_instance(api_url, &*self.storage))
    }

    /// # Errors
    ///
    /// Returns an error for a malformed path or a value that does not fit.
    pub fn save_generic(&self, key: &str, value: Value) -> Result<()> {
        self.try_update(|state| state.config.save_generic(key, value))
    }

    /// # Errors
    ///
    /// Returns an error if the local config cannot be written.
    pub fn save_local(&self, payload: &LocalConfig) -> Result<()> {
        self.try_update(|state| state.config.save_local(payload, &*self.storage))
    }

    pub fn set_unsaved_changes(&self, unsaved: bool) {
        self.update(|state| state.config.set_unsaved_changes(unsaved));
    }

    pub fn set_layout_mode(&self, layout_mode: bool) {
        self.update(|state| state.config.set_layout_mode(layout_mode));
    }

    pub fn update_hidden_macros(&self, macro_: &Macro) {
        self.update(|state| state.config.update_hidden_macros(macro_));
    }

    pub fn update_preset(&self, index: i64, preset: TempPreset) {
        self.update(|state| state.config.update_preset(index, preset));
    }

    pub fn remove_preset(&self, index: usize) {
        self.update(|state| state.config.remove_preset(index));
    }

    // Socket slice

    pub fn set_connection(&self, open: bool, connecting: bool) {
        self.update(|state| state.socket.set_connection(open, connecting));
    }

    #[must_use]
    pub fn has_wait(&self, token: &str) -> bool {
        self.waits.has(token)
    }

    #[must_use]
    pub fn has_any_wait_of<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        self.waits.has_any_of(tokens)
    }

    #[must_use]
    pub fn has_waits(&self) -> bool {
        self.waits.has_any()
    }

    /// Route one inbound event to the reducer that owns it.
    pub fn apply(&self, event: InboundEvent) {
        self.apply_at(event, now_millis());
    }

    /// [`Store::apply`] with an explicit clock, for chart timestamps.
    pub fn apply_at(&self, event: InboundEvent, now_ms: i64) {
        match event {
            InboundEvent::Response {
                method,
                dispatch,
                result,
                ..
            } => match result {
                Ok(result) => self.on_response(dispatch, result, now_ms),
                Err(err) => warn!("{method} failed: {err}"),
            },
            InboundEvent::Notification(notification) => {
                self.on_notification(notification, now_ms);
            }
            InboundEvent::Disconnected => self.set_connection(false, false),
        }
    }

    fn on_response(&self, dispatch: DispatchTarget, result: Value, now_ms: i64) {
        match dispatch {
            DispatchTarget::Void
            | DispatchTarget::SocketOnPrintCancel
            | DispatchTarget::SocketOnPrintPause
            | DispatchTarget::SocketOnPrintResume
            | DispatchTarget::SocketOnGcodeScript => {
                debug!("No state change for {dispatch}");
            }
            DispatchTarget::SocketOnPrinterInfo => {
                self.update(|state| state.socket.on_printer_info(result));
            }
            DispatchTarget::SocketOnPrinterObjectsSubscribe => {
                let Some(status) = result.get("status").and_then(Value::as_object) else {
                    warn!("Subscribe reply without a status object");
                    return;
                };
                self.update(|state| state.socket.on_status_update(status, now_ms));
            }
            DispatchTarget::SocketOnPrinterObjectsList => {
                self.update(|state| state.socket.on_printer_objects_list(&result));
            }
            DispatchTarget::SocketOnQueryEndstops => {
                self.update(|state| state.socket.on_query_endstops(&result));
            }
            DispatchTarget::SocketOnTemperatureStore => {
                self.update(|state| state.socket.on_temperature_store(&result, now_ms));
            }
            DispatchTarget::SocketNotifyKlippyDisconnected => {
                self.update(|state| state.socket.on_klippy_disconnected());
            }
            DispatchTarget::FilesOnFileUpdate => {
                self.update(|state| state.socket.on_file_update(result));
            }
            other => {
                self.update(|state| state.socket.set_external(other.as_str(), result));
            }
        }
    }

    fn on_notification(&self, notification: ServerNotification, now_ms: i64) {
        let method = notification.method();
        match notification {
            ServerNotification::StatusUpdate { status, .. } => {
                self.update(|state| state.socket.on_status_update(&status, now_ms));
            }
            ServerNotification::KlippyReady => {
                self.update(|state| state.socket.on_klippy_ready());
            }
            ServerNotification::KlippyShutdown => {
                self.update(|state| state.socket.on_klippy_shutdown());
            }
            ServerNotification::KlippyDisconnected => {
                self.update(|state| state.socket.on_klippy_disconnected());
            }
            ServerNotification::GcodeResponse { line } => {
                self.update(|state| state.socket.on_gcode_response(line));
            }
            ServerNotification::FilelistChanged { payload }
            | ServerNotification::UpdateResponse { payload }
            | ServerNotification::PowerChanged { device: payload } => {
                self.update(|state| state.socket.set_external(method, payload));
            }
        }
    }
}
