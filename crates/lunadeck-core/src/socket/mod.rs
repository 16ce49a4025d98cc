//! Socket slice: the live printer object graph and everything derived from
//! socket traffic.

mod chart;
mod getters;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use lunadeck_types::{ChartPoint, ChartSeries, Endstops, classify};

use crate::utils::finite_number;

pub use chart::{lighten, named_color, rgb_string, rgba_string};

/// Samples kept per chart series; Moonraker's temperature store holds 1200.
pub const CHART_HISTORY: usize = 1200;

/// Console lines kept from `notify_gcode_response`.
pub const CONSOLE_HISTORY: usize = 1000;

const TARGET_SUFFIX: &str = "Target";

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SocketState {
    pub open: bool,
    pub connecting: bool,
    /// Printer objects keyed by their Klipper name, plus `info` from
    /// `printer.info` and `current_file` from the printing file's metadata.
    pub printer: Map<String, Value>,
    /// Every object the printer reports, subscribed or not.
    pub objects: Vec<String>,
    pub endstops: Endstops,
    pub chart: Vec<ChartSeries>,
    pub console: Vec<String>,
    /// Replies owned by other slices, keyed by dispatch target or
    /// notification method.
    pub external: BTreeMap<String, Value>,
}

fn series(label: String, samples: &[Value], now_ms: i64) -> ChartSeries {
    let count = samples.len();
    let data = samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let age = i64::try_from(count - 1 - i).unwrap_or(i64::MAX / 1000);
            ChartPoint {
                x: now_ms - age * 1000,
                y: finite_number(Some(sample)),
            }
        })
        .collect();
    ChartSeries {
        label,
        data,
        radius: 0.0,
    }
}

impl SocketState {
    pub fn set_connection(&mut self, open: bool, connecting: bool) {
        self.open = open;
        self.connecting = connecting;
    }

    pub fn on_printer_info(&mut self, info: Value) {
        self.printer.insert("info".to_string(), info);
    }

    /// Merge partial object updates field by field. A field's new value
    /// replaces the old one whole; fields not mentioned are kept.
    pub fn on_status_update(&mut self, status: &Map<String, Value>, now_ms: i64) {
        for (key, update) in status {
            let merged = match (self.printer.get_mut(key), update) {
                (Some(Value::Object(existing)), Value::Object(fields)) => {
                    for (field, value) in fields {
                        existing.insert(field.clone(), value.clone());
                    }
                    true
                }
                _ => false,
            };
            if !merged {
                self.printer.insert(key.clone(), update.clone());
            }
            self.append_chart_samples(key, update, now_ms);
        }
    }

    fn append_chart_samples(&mut self, key: &str, update: &Value, now_ms: i64) {
        if self.chart.is_empty() {
            return;
        }
        let label = classify(key).name;
        for (field, suffix) in [("temperature", ""), ("target", TARGET_SUFFIX)] {
            let Some(value) = update.get(field) else {
                continue;
            };
            let wanted = format!("{label}{suffix}");
            if let Some(series) = self.chart.iter_mut().find(|s| s.label == wanted) {
                series.data.push(ChartPoint {
                    x: now_ms,
                    y: finite_number(Some(value)),
                });
                if series.data.len() > CHART_HISTORY {
                    let excess = series.data.len() - CHART_HISTORY;
                    series.data.drain(..excess);
                }
            }
        }
    }

    pub fn on_printer_objects_list(&mut self, result: &Value) {
        self.objects = result
            .get("objects")
            .and_then(Value::as_array)
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
    }

    pub fn on_query_endstops(&mut self, result: &Value) {
        self.endstops = result
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(name, state)| {
                        let state = state
                            .as_str()
                            .map_or_else(|| state.to_string(), String::from);
                        (name.clone(), state)
                    })
                    .collect()
            })
            .unwrap_or_default();
    }

    /// Rebuild the chart from Moonraker's temperature history. Samples are
    /// one second apart and the newest one is stamped `now_ms`.
    pub fn on_temperature_store(&mut self, result: &Value, now_ms: i64) {
        let Some(store) = result.as_object() else {
            return;
        };
        let mut chart = Vec::new();
        for (key, history) in store {
            let label = classify(key).name;
            if let Some(temperatures) = history.get("temperatures").and_then(Value::as_array) {
                chart.push(series(label.clone(), temperatures, now_ms));
            }
            if let Some(targets) = history.get("targets").and_then(Value::as_array) {
                chart.push(series(format!("{label}{TARGET_SUFFIX}"), targets, now_ms));
            }
        }
        debug!("Chart rebuilt with {} series", chart.len());
        self.chart = chart;
    }

    /// Store the metadata of the file being printed; other files go to the
    /// external slot.
    pub fn on_file_update(&mut self, result: Value) {
        let printing = self.printer_str("print_stats", "filename");
        let is_current = !printing.is_empty()
            && result.get("filename").and_then(Value::as_str) == Some(printing);
        if is_current {
            self.printer.insert("current_file".to_string(), result);
        } else {
            self.set_external("files/onFileUpdate", result);
        }
    }

    pub fn on_klippy_ready(&mut self) {
        self.set_webhooks_state("ready");
    }

    pub fn on_klippy_shutdown(&mut self) {
        self.set_webhooks_state("shutdown");
    }

    /// Klippy went away: everything in the object graph is stale.
    pub fn on_klippy_disconnected(&mut self) {
        self.printer.clear();
        self.endstops.clear();
        self.chart.clear();
    }

    pub fn on_gcode_response(&mut self, line: String) {
        self.console.push(line);
        if self.console.len() > CONSOLE_HISTORY {
            let excess = self.console.len() - CONSOLE_HISTORY;
            self.console.drain(..excess);
        }
    }

    pub fn set_external(&mut self, key: impl Into<String>, payload: Value) {
        self.external.insert(key.into(), payload);
    }

    #[must_use]
    pub fn external(&self, key: &str) -> Option<&Value> {
        self.external.get(key)
    }

    fn set_webhooks_state(&mut self, state: &str) {
        let webhooks = self
            .printer
            .entry("webhooks")
            .or_insert_with(|| Value::Object(Map::new()));
        match webhooks {
            Value::Object(map) => {
                map.insert("state".to_string(), Value::from(state));
            }
            other => *other = serde_json::json!({ "state": state }),
        }
    }

    pub(crate) fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.printer.get(key).and_then(Value::as_object)
    }

    pub(crate) fn field(&self, key: &str, field: &str) -> Option<&Value> {
        self.object(key).and_then(|object| object.get(field))
    }

    /// String field of an object, empty when absent.
    pub(crate) fn printer_str(&self, key: &str, field: &str) -> &str {
        self.field(key, field).and_then(Value::as_str).unwrap_or("")
    }

    /// Section of the loaded Klipper config (`configfile.config.<key>`).
    pub(crate) fn config_section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.field("configfile", "config")
            .and_then(|config| config.get(key))
            .and_then(Value::as_object)
    }
}
