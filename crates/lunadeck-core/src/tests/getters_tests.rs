//! Tests for the telemetry projection

use super::fixtures::{sample_socket, set_field, socket_with};
use crate::EstimateKind;
use serde_json::json;

// ============================================================================
// Klippy and printer state
// ============================================================================

#[test]
fn test_klippy_connected_when_both_ready() {
    let socket = sample_socket();

    assert!(socket.klippy_connected());
    assert_eq!(socket.klippy_state(), "Ready");
}

#[test]
fn test_klippy_state_reports_side_that_is_not_ready() {
    let mut socket = sample_socket();
    set_field(&mut socket, "info", "state", json!("shutdown"));

    assert!(!socket.klippy_connected());
    assert_eq!(socket.klippy_state(), "Shutdown");

    set_field(&mut socket, "webhooks", "state", json!("startup"));
    assert_eq!(socket.klippy_state(), "Startup");
}

#[test]
fn test_klippy_state_before_any_data() {
    let socket = socket_with(json!({}));

    assert!(!socket.klippy_connected());
    assert_eq!(socket.klippy_state(), "");
}

#[test]
fn test_klippy_state_message_prefers_webhooks() {
    let mut socket = sample_socket();
    assert_eq!(socket.klippy_state_message(), "Printer is ready");

    set_field(&mut socket, "webhooks", "state_message", json!(""));
    set_field(
        &mut socket,
        "info",
        "state_message",
        json!("  MCU 'mcu' shutdown\r\nOnce the underlying issue is corrected\rrestart\n"),
    );
    assert_eq!(
        socket.klippy_state_message(),
        "MCU 'mcu' shutdown\nOnce the underlying issue is corrected\nrestart"
    );
}

#[test]
fn test_printer_state() {
    let mut socket = sample_socket();
    assert_eq!(socket.printer_state(), "Idle");

    set_field(&mut socket, "idle_timeout", "state", json!("Printing"));
    assert_eq!(socket.printer_state(), "Busy");

    set_field(&mut socket, "print_stats", "state", json!("printing"));
    assert_eq!(socket.printer_state(), "Printing");

    set_field(&mut socket, "print_stats", "state", json!("paused"));
    assert_eq!(socket.printer_state(), "paused");
}

#[test]
fn test_printer_state_busy_from_lowercase_idle_timeout() {
    let socket = socket_with(json!({
        "idle_timeout": { "state": "printing" },
        "print_stats": { "state": "standby" }
    }));

    assert_eq!(socket.printer_state(), "Busy");
}

#[test]
fn test_printer_state_loading_until_both_known() {
    let socket = socket_with(json!({ "print_stats": { "state": "standby" } }));
    assert_eq!(socket.printer_state(), "Loading");

    let socket = socket_with(json!({ "idle_timeout": { "state": "Ready" } }));
    assert_eq!(socket.printer_state(), "Loading");
}

#[test]
fn test_connection_flags() {
    let mut socket = sample_socket();
    assert!(!socket.connection_state());

    socket.set_connection(false, true);
    assert!(socket.connecting_state());

    socket.set_connection(true, false);
    assert!(socket.connection_state());
    assert!(!socket.connecting_state());
}

// ============================================================================
// Time estimates
// ============================================================================

fn printing_socket() -> crate::SocketState {
    let mut socket = sample_socket();
    set_field(&mut socket, "print_stats", "print_duration", json!(600.0));
    set_field(&mut socket, "print_stats", "filament_used", json!(1000.0));
    set_field(&mut socket, "display_status", "progress", json!(0.25));
    set_field(&mut socket, "current_file", "filament_total", json!(4000.0));
    set_field(&mut socket, "current_file", "estimated_time", json!(3000.0));
    socket
}

#[test]
fn test_time_estimate_by_file_progress() {
    let estimates = printing_socket().time_estimates(EstimateKind::File);

    assert_eq!(estimates.kind, EstimateKind::File);
    assert_eq!(estimates.progress, "25");
    assert_eq!(estimates.duration, "10m 0s");
    assert_eq!(estimates.total_duration, "40m 0s");
    assert_eq!(estimates.time_left, "30m 0s");
    assert_eq!(estimates.time_left_secs, 1800.0);
}

#[test]
fn test_time_estimate_by_filament() {
    let estimates = printing_socket().time_estimates(EstimateKind::Filament);

    assert_eq!(estimates.total_duration_secs, 2400.0);
    assert_eq!(estimates.time_left_secs, 1800.0);
}

#[test]
fn test_time_estimate_by_slicer() {
    let mut socket = printing_socket();
    let estimates = socket.time_estimates(EstimateKind::Slicer);
    assert_eq!(estimates.total_duration, "50m 0s");
    assert_eq!(estimates.time_left, "40m 0s");

    set_field(&mut socket, "current_file", "estimated_time", json!(0));
    let estimates = socket.time_estimates(EstimateKind::Slicer);
    assert_eq!(estimates.total_duration_secs, 600.0);
    assert_eq!(estimates.time_left_secs, 0.0);
}

#[test]
fn test_time_estimate_negative_time_left_is_kept() {
    let mut socket = printing_socket();
    set_field(&mut socket, "current_file", "estimated_time", json!(300.0));

    let estimates = socket.time_estimates(EstimateKind::Slicer);

    assert_eq!(estimates.time_left_secs, -300.0);
    assert_eq!(estimates.time_left, "-5m 0s");
}

#[test]
fn test_time_estimate_totals_only_reports_duration() {
    let estimates = printing_socket().time_estimates(EstimateKind::Totals);

    assert_eq!(estimates.total_duration_secs, 0.0);
    assert_eq!(estimates.time_left_secs, 0.0);
    assert_eq!(estimates.duration, "10m 0s");
}

#[test]
fn test_time_estimate_non_finite_inputs_are_zero() {
    let socket = socket_with(json!({
        "display_status": { "progress": "NaN" },
        "print_stats": { "print_duration": "Infinity", "filament_used": null }
    }));

    for kind in [
        EstimateKind::File,
        EstimateKind::Filament,
        EstimateKind::Slicer,
        EstimateKind::Totals,
    ] {
        let estimates = socket.time_estimates(kind);
        assert_eq!(estimates.progress, "0");
        assert_eq!(estimates.time_left, "0m 0s");
        assert_eq!(estimates.duration, "0m 0s");
        assert_eq!(estimates.total_duration, "0m 0s");
        assert_eq!(estimates.time_left_secs, 0.0);
        assert_eq!(estimates.total_duration_secs, 0.0);
    }
}

// ============================================================================
// Homing, runout sensors, bed meshes, endstops
// ============================================================================

#[test]
fn test_homed_axes() {
    let socket = sample_socket();

    assert!(socket.homed_axes("xy"));
    assert!(socket.homed_axes("x"));
    assert!(!socket.homed_axes("xyz"));
    assert!(!socket.homed_axes(""));
}

#[test]
fn test_runout_sensors() {
    let socket = sample_socket();

    let sensors = socket.runout_sensors();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].name, "runout");
    assert!(sensors[0].enabled);
    assert!(!sensors[0].filament_detected);

    assert!(socket.runout_sensor_by_name("runout").is_some());
    assert!(socket.runout_sensor_by_name("missing").is_none());
}

#[test]
fn test_bed_meshes_sorted_with_default_last() {
    let socket = sample_socket();

    let meshes = socket.bed_meshes();
    let names: Vec<_> = meshes.iter().map(|m| m.profile_name.as_str()).collect();

    assert_eq!(names, vec!["a_mesh", "b_mesh", "default"]);
    assert!(meshes[1].active);
    assert!(!meshes[0].active);
    assert!(!meshes[2].active);
}

#[test]
fn test_bed_meshes_sort_ignores_case() {
    let socket = socket_with(json!({
        "configfile": { "config": {
            "bed_mesh default": {},
            "bed_mesh Zeta": {},
            "bed_mesh alpha": {},
            "bed_mesh Beta": {}
        } }
    }));

    let names: Vec<_> = socket
        .bed_meshes()
        .into_iter()
        .map(|m| m.profile_name)
        .collect();

    assert_eq!(names, vec!["alpha", "Beta", "Zeta", "default"]);
}

#[test]
fn test_supports_bed_mesh() {
    assert!(sample_socket().supports_bed_mesh());
    assert!(!socket_with(json!({ "configfile": { "config": {} } })).supports_bed_mesh());
    assert!(!socket_with(json!({})).supports_bed_mesh());
}

#[test]
fn test_endstops_sorted_by_name() {
    let mut socket = sample_socket();
    socket.on_query_endstops(&json!({ "z": "open", "x": "TRIGGERED", "y": "open" }));

    let endstops = socket.endstops();
    let names: Vec<_> = endstops.keys().map(String::as_str).collect();

    assert_eq!(names, vec!["x", "y", "z"]);
    assert_eq!(endstops["x"], "TRIGGERED");
}

// ============================================================================
// Heaters, fans, sensors
// ============================================================================

#[test]
fn test_heaters_sorted_and_named() {
    let heaters = sample_socket().heaters();
    let names: Vec<_> = heaters.iter().map(|h| h.name.as_str()).collect();

    assert_eq!(names, vec!["chamber", "extruder", "heater_bed"]);
    assert_eq!(heaters[0].key, "heater_generic chamber");
    assert_eq!(heaters[0].max_temp, Some(70));
}

#[test]
fn test_heater_merges_live_and_config() {
    let heaters = sample_socket().heaters();
    let extruder = heaters.iter().find(|h| h.name == "extruder").unwrap();

    assert_eq!(extruder.temperature, 210.3);
    assert_eq!(extruder.target, 210.0);
    assert_eq!(extruder.min_temp, Some(0));
    assert_eq!(extruder.max_temp, Some(280));
    assert_eq!(
        extruder.properties.get("sensor_type"),
        Some(&json!("ATC Semitec 104GT-2"))
    );
    assert_eq!(extruder.properties.get("power"), Some(&json!(0.45)));
}

#[test]
fn test_heaters_skip_unreported_objects() {
    let mut socket = sample_socket();
    set_field(
        &mut socket,
        "heaters",
        "available_heaters",
        json!(["extruder", "extruder1"]),
    );

    let heaters = socket.heaters();

    assert_eq!(heaters.len(), 1);
    assert_eq!(heaters[0].name, "extruder");
}

#[test]
fn test_heater_without_config_limits() {
    let socket = socket_with(json!({
        "heaters": { "available_heaters": ["extruder"] },
        "extruder": { "temperature": 20.0 },
        "configfile": { "config": { "extruder": { "max_temp": "" } } }
    }));

    let heaters = socket.heaters();

    assert_eq!(heaters[0].min_temp, None);
    assert_eq!(heaters[0].max_temp, None);
}

#[test]
fn test_fans_pretty_names_and_control() {
    let fans = sample_socket().fans(&[]);
    assert_eq!(fans.len(), 4);

    let by_key = |key: &str| fans.iter().find(|f| f.key == key).unwrap();

    let part = by_key("fan");
    assert_eq!(part.pretty_name, "Part Fan");
    assert!(part.controllable);
    assert_eq!(part.speed, 0.5);

    let hotend = by_key("heater_fan hotend_fan");
    assert_eq!(hotend.name, "hotend_fan");
    assert_eq!(hotend.pretty_name, "Hotend Fan");
    assert_eq!(hotend.kind, "heater_fan");
    assert!(!hotend.controllable);
    assert_eq!(hotend.properties.get("heater"), Some(&json!("extruder")));

    let electronics = by_key("controller_fan electronics");
    assert_eq!(electronics.pretty_name, "Electronics Fan");
    assert_eq!(electronics.rpm, Some(4200.0));

    assert_eq!(by_key("fan_generic nevermore").pretty_name, "Nevermore Fan");
}

#[test]
fn test_fans_filtered_by_type() {
    let socket = sample_socket();

    let fans = socket.fans(&["heater_fan", "controller_fan"]);
    let mut keys: Vec<_> = fans.iter().map(|f| f.key.as_str()).collect();
    keys.sort_unstable();

    assert_eq!(keys, vec!["controller_fan electronics", "heater_fan hotend_fan"]);
}

#[test]
fn test_sensors() {
    let sensors = sample_socket().sensors();
    assert_eq!(sensors.len(), 2);

    let pi = sensors.iter().find(|s| s.name == "raspberry_pi").unwrap();
    assert_eq!(pi.kind, "temperature_sensor");
    assert_eq!(pi.temperature, 48.2);
    assert_eq!(pi.min_temp, Some(10));
    assert_eq!(pi.max_temp, Some(100));

    let eddy = sensors.iter().find(|s| s.name == "eddy").unwrap();
    assert_eq!(eddy.kind, "temperature_probe");
    assert_eq!(eddy.max_temp, None);
}

// ============================================================================
// Macros and chart
// ============================================================================

#[test]
fn test_macros_from_graph_and_object_list() {
    let mut socket = sample_socket();
    socket.on_printer_objects_list(&json!({
        "objects": ["gcode_macro LOAD_FILAMENT", "gcode_macro PURGE", "toolhead"]
    }));
    let hidden = vec!["PURGE".to_string()];

    let macros = socket.macros(&hidden);
    let names: Vec<_> = macros.iter().map(|m| m.name.as_str()).collect();

    assert_eq!(names, vec!["LOAD_FILAMENT", "PRINT_START", "PURGE"]);
    assert!(!macros[2].visible);
    assert_eq!(
        socket.visible_macros(&hidden),
        vec!["LOAD_FILAMENT", "PRINT_START"]
    );
}

#[test]
fn test_chart_data_styles_series() {
    let mut socket = sample_socket();
    socket.on_temperature_store(
        &json!({
            "extruder": { "temperatures": [200.0, 205.0], "targets": [210.0, 210.0] },
            "temperature_sensor raspberry_pi": { "temperatures": [47.0, 48.0] }
        }),
        10_000,
    );

    let chart = socket.chart_data();
    assert_eq!(chart.datasets.len(), 3);

    let extruder = chart
        .datasets
        .iter()
        .find(|d| d.label == "extruder")
        .unwrap();
    assert_eq!(extruder.fill, Some(true));
    assert_eq!(extruder.data[0].x, 9_000);
    assert_eq!(extruder.data[1].x, 10_000);

    let target = chart
        .datasets
        .iter()
        .find(|d| d.label == "extruderTarget")
        .unwrap();
    assert_eq!(target.fill, Some(false));
    assert!(target.border_color.is_some());

    let pi = chart
        .datasets
        .iter()
        .find(|d| d.label == "raspberry_pi")
        .unwrap();
    assert!(pi.border_color.is_none());
}
