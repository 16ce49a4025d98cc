//! Tests for the store: snapshots, persistence and inbound event routing

use super::fixtures::{ReadOnlyStorage, api, sample_printer};
use crate::config::{FileConfigLoad, InstancesInit};
use crate::storage::{INSTANCES_KEY, MemoryStorage, Storage};
use crate::{Macro, Store};
use lunadeck_rpc::{DispatchTarget, InboundEvent, RpcError, ServerNotification, WaitRegistry};
use serde_json::{Value, json};
use std::sync::Arc;

fn store() -> (Store, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Store::new(storage.clone(), WaitRegistry::new());
    (store, storage)
}

fn reply(dispatch: DispatchTarget, result: Value) -> InboundEvent {
    InboundEvent::Response {
        id: 1.into(),
        method: "test.method".to_string(),
        dispatch,
        wait: None,
        result: Ok(result),
    }
}

fn notify(notification: ServerNotification) -> InboundEvent {
    InboundEvent::Notification(notification)
}

fn loaded_store() -> Store {
    let (store, _) = store();
    store.apply_at(
        reply(
            DispatchTarget::SocketOnPrinterObjectsSubscribe,
            json!({ "eventtime": 1.0, "status": sample_printer() }),
        ),
        0,
    );
    store
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_snapshots_are_immutable() {
    let (store, _) = store();
    let before = store.snapshot();

    store.set_layout_mode(true);

    assert!(!before.config.layout_mode);
    assert!(store.snapshot().config.layout_mode);
}

#[test]
fn test_subscribers_see_each_update() {
    let (store, _) = store();
    let mut rx = store.subscribe();
    assert!(!rx.has_changed().unwrap());

    store.set_unsaved_changes(true);

    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().config.unsaved_changes);
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_reset_is_one_notification() {
    let (store, _) = store();
    store.init_api_config(&api("http://voron.local"));
    store.set_layout_mode(true);
    let mut rx = store.subscribe();

    store.reset();

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(state.config.api_url.is_empty());
    assert!(!state.config.layout_mode);
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_failed_persist_is_not_published() {
    let store = Store::new(Arc::new(ReadOnlyStorage), WaitRegistry::new());
    store.init_api_config(&api("http://voron.local"));
    let mut rx = store.subscribe();

    let payload = InstancesInit {
        api_config: Some(api("http://voron.local")),
        file_config: FileConfigLoad::Loaded,
    };
    assert!(store.init_instances(&payload).is_err());

    assert!(!rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().config.instances.is_empty());
}

// ============================================================================
// Config operations through the store
// ============================================================================

#[test]
fn test_init_sequence() {
    let (store, storage) = store();
    let api = api("http://voron.local:7125");

    store.init_api_config(&api);
    store.init_local().unwrap();
    store
        .init_file(Some(&json!({ "general": { "instanceName": "Voron" } })))
        .unwrap();
    store
        .init_instances(&InstancesInit {
            api_config: Some(api),
            file_config: FileConfigLoad::Loaded,
        })
        .unwrap();

    let state = store.snapshot();
    assert_eq!(state.config.api_url, "http://voron.local:7125");
    assert_eq!(state.config.instances.len(), 1);
    assert_eq!(state.config.instances[0].name, "Voron");
    assert!(storage.contains(INSTANCES_KEY).unwrap());
}

#[test]
fn test_remove_instance_through_store() {
    let (store, storage) = store();
    let payload = InstancesInit {
        api_config: Some(api("http://voron.local")),
        file_config: FileConfigLoad::Missing,
    };
    store.init_instances(&payload).unwrap();

    store.remove_instance("http://voron.local").unwrap();

    assert!(store.snapshot().config.instances.is_empty());
    assert_eq!(storage.get(INSTANCES_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn test_visible_macros_follow_hidden_list() {
    let store = loaded_store();
    assert_eq!(store.snapshot().visible_macros(), vec!["PRINT_START", "PURGE"]);

    store.update_hidden_macros(&Macro {
        name: "PURGE".to_string(),
        visible: false,
    });

    assert_eq!(store.snapshot().visible_macros(), vec!["PRINT_START"]);
}

// ============================================================================
// Inbound routing
// ============================================================================

#[test]
fn test_subscribe_reply_fills_object_graph() {
    let store = loaded_store();
    let state = store.snapshot();

    assert!(state.socket.klippy_connected());
    assert_eq!(state.socket.heaters().len(), 3);
}

#[test]
fn test_status_notifications_merge() {
    let store = loaded_store();
    let mut status = serde_json::Map::new();
    status.insert("extruder".to_string(), json!({ "temperature": 180.5 }));

    store.apply_at(
        notify(ServerNotification::StatusUpdate {
            status,
            eventtime: Some(2.0),
        }),
        0,
    );

    let state = store.snapshot();
    let extruder = state.socket.printer.get("extruder").unwrap();
    assert_eq!(extruder["temperature"], json!(180.5));
    assert_eq!(extruder["target"], json!(210.0));
}

#[test]
fn test_printer_info_reply() {
    let (store, _) = store();

    store.apply(reply(
        DispatchTarget::SocketOnPrinterInfo,
        json!({ "state": "startup", "state_message": "Starting" }),
    ));

    let state = store.snapshot();
    assert_eq!(state.socket.printer["info"]["state"], "startup");
}

#[test]
fn test_endstops_and_objects_replies() {
    let (store, _) = store();

    store.apply(reply(
        DispatchTarget::SocketOnQueryEndstops,
        json!({ "x": "open", "y": "TRIGGERED" }),
    ));
    store.apply(reply(
        DispatchTarget::SocketOnPrinterObjectsList,
        json!({ "objects": ["toolhead", "gcode_macro PARK"] }),
    ));

    let state = store.snapshot();
    assert_eq!(state.socket.endstops().len(), 2);
    assert_eq!(state.socket.objects, vec!["toolhead", "gcode_macro PARK"]);
}

#[test]
fn test_temperature_store_reply_builds_chart() {
    let (store, _) = store();

    store.apply_at(
        reply(
            DispatchTarget::SocketOnTemperatureStore,
            json!({ "heater_bed": { "temperatures": [20.0, 21.0], "targets": [60.0, 60.0] } }),
        ),
        5_000,
    );

    let chart = store.snapshot().socket.chart_data();
    assert_eq!(chart.datasets.len(), 2);
}

#[test]
fn test_klippy_lifecycle_notifications() {
    let store = loaded_store();

    store.apply(notify(ServerNotification::KlippyShutdown));
    assert_eq!(store.snapshot().socket.klippy_state(), "Shutdown");

    store.apply(notify(ServerNotification::KlippyReady));
    assert_eq!(store.snapshot().socket.klippy_state(), "Ready");

    store.apply(notify(ServerNotification::KlippyDisconnected));
    assert!(store.snapshot().socket.printer.is_empty());
}

#[test]
fn test_gcode_responses_collect_in_console() {
    let (store, _) = store();

    store.apply(notify(ServerNotification::GcodeResponse {
        line: "// probe at 150.000,150.000 is z=1.234".to_string(),
    }));

    assert_eq!(store.snapshot().socket.console.len(), 1);
}

#[test]
fn test_unowned_replies_go_to_external_slot() {
    let (store, _) = store();

    store.apply(reply(
        DispatchTarget::VersionOnUpdateStatus,
        json!({ "busy": false }),
    ));
    store.apply(notify(ServerNotification::PowerChanged {
        device: json!({ "device": "printer", "status": "on" }),
    }));

    let state = store.snapshot();
    assert_eq!(
        state.socket.external("version/onUpdateStatus"),
        Some(&json!({ "busy": false }))
    );
    assert!(state.socket.external("notify_power_changed").is_some());
}

#[test]
fn test_void_and_error_replies_change_nothing() {
    let (store, _) = store();
    let before = store.snapshot();

    store.apply(reply(DispatchTarget::Void, json!("ok")));
    store.apply(InboundEvent::Response {
        id: 2.into(),
        method: "printer.gcode.script".to_string(),
        dispatch: DispatchTarget::SocketOnGcodeScript,
        wait: None,
        result: Err(RpcError::new(400, "Unknown command")),
    });

    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}

#[test]
fn test_disconnect_closes_connection() {
    let (store, _) = store();
    store.set_connection(true, false);

    store.apply(InboundEvent::Disconnected);

    assert!(!store.snapshot().socket.connection_state());
}

#[test]
fn test_waits_are_shared_with_the_registry() {
    let waits = WaitRegistry::new();
    let store = Store::new(Arc::new(MemoryStorage::new()), waits.clone());
    assert!(!store.has_waits());

    waits.add("onPrintPause");

    assert!(store.has_wait("onPrintPause"));
    assert!(store.has_any_wait_of(&["onPrintCancel", "onPrintPause"]));
    assert!(store.has_waits());
}
