//! Read-side projections of the printer object graph.
//!
//! Every function here is pure and recomputes its result from the current
//! graph; nothing is cached.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use lunadeck_types::{
    BedMesh, Chart, EstimateKind, Fan, Heater, Macro, ObjectKind, RunoutSensor, Sensor,
    TimeEstimates, classify,
};

use super::SocketState;
use super::chart::dataset;
use crate::utils::{
    capitalize, finite_number, format_counter_time, is_truthy, parse_int, sanitize, start_case,
};

const DEFAULT_FANS: [&str; 5] = [
    "temperature_fan",
    "controller_fan",
    "heater_fan",
    "fan_generic",
    "fan",
];

/// Live object with its config section laid over it.
fn merged(live: &Map<String, Value>, config: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut properties = live.clone();
    if let Some(config) = config {
        for (key, value) in config {
            properties.insert(key.clone(), value.clone());
        }
    }
    properties
}

fn temp_limit(config: Option<&Map<String, Value>>, field: &str) -> Option<i64> {
    let value = config.and_then(|c| c.get(field));
    if is_truthy(value) {
        value.and_then(parse_int)
    } else {
        None
    }
}

fn f64_field(object: &Map<String, Value>, field: &str) -> f64 {
    object.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn bool_field(object: &Map<String, Value>, field: &str) -> bool {
    object.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn by_name_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_uppercase().cmp(&b.to_uppercase())
}

impl SocketState {
    #[must_use]
    pub fn connection_state(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn connecting_state(&self) -> bool {
        self.connecting
    }

    /// Both Moonraker's view (`webhooks`) and Klipper's (`info`) say ready.
    #[must_use]
    pub fn klippy_connected(&self) -> bool {
        self.printer_str("info", "state") == "ready"
            && self.printer_str("webhooks", "state") == "ready"
    }

    /// The state to show: whichever side is not ready, capitalized.
    #[must_use]
    pub fn klippy_state(&self) -> String {
        let webhooks = self.printer_str("webhooks", "state");
        let info = self.printer_str("info", "state");

        if webhooks == info || webhooks != "ready" {
            capitalize(webhooks)
        } else {
            capitalize(info)
        }
    }

    /// `webhooks.state_message`, falling back to `info.state_message`.
    #[must_use]
    pub fn klippy_state_message(&self) -> String {
        let webhooks = self.printer_str("webhooks", "state_message");
        let message = if webhooks.is_empty() {
            self.printer_str("info", "state_message")
        } else {
            webhooks
        };
        message.trim().replace("\r\n", "\n").replace('\r', "\n")
    }

    /// `paused`, `Busy`, the idle timeout state, or `Loading` before both
    /// states are known.
    #[must_use]
    pub fn printer_state(&self) -> String {
        let idle = self.printer_str("idle_timeout", "state");
        let stats = self.printer_str("print_stats", "state");

        if idle.is_empty() || stats.is_empty() {
            return "Loading".to_string();
        }
        if stats.eq_ignore_ascii_case("paused") {
            return stats.to_string();
        }
        if idle.eq_ignore_ascii_case("printing") && !stats.eq_ignore_ascii_case("printing") {
            return "Busy".to_string();
        }
        idle.to_string()
    }

    /// Project print time from progress, filament use or the slicer.
    /// Non-numeric and non-finite inputs count as zero; a negative time
    /// left is reported as is.
    #[must_use]
    // Whole percent of a sanitized fraction fits in i64
    #[allow(clippy::cast_possible_truncation)]
    pub fn time_estimates(&self, kind: EstimateKind) -> TimeEstimates {
        let progress = finite_number(self.field("display_status", "progress"));
        let duration = finite_number(self.field("print_stats", "print_duration"));
        let used_filament = finite_number(self.field("print_stats", "filament_used"));
        let estimated_filament = finite_number(self.field("current_file", "filament_total"));
        let slicer_estimate = finite_number(self.field("current_file", "estimated_time"));

        let total = match kind {
            EstimateKind::Slicer => {
                if slicer_estimate > 0.0 {
                    slicer_estimate
                } else {
                    duration
                }
            }
            EstimateKind::Filament => duration / (used_filament / estimated_filament),
            EstimateKind::File => duration / progress,
            EstimateKind::Totals => 0.0,
        };
        let time_left = if kind == EstimateKind::Totals {
            0.0
        } else {
            sanitize(total - duration)
        };
        let total = sanitize(total);

        TimeEstimates {
            kind,
            progress: format!("{}", (progress * 100.0).round() as i64),
            time_left: format_counter_time(time_left),
            duration: format_counter_time(duration),
            total_duration: format_counter_time(total),
            time_left_secs: time_left,
            duration_secs: duration,
            total_duration_secs: total,
        }
    }

    /// True when every axis letter in `axes` has been homed.
    #[must_use]
    pub fn homed_axes(&self, axes: &str) -> bool {
        if axes.is_empty() {
            return false;
        }
        let homed = self.printer_str("toolhead", "homed_axes");
        axes.chars().all(|axis| homed.contains(axis))
    }

    #[must_use]
    pub fn runout_sensor_by_name(&self, name: &str) -> Option<RunoutSensor> {
        let object = self.object(&format!("filament_switch_sensor {name}"))?;
        Some(RunoutSensor {
            name: name.to_string(),
            enabled: bool_field(object, "enabled"),
            filament_detected: bool_field(object, "filament_detected"),
            properties: object.clone(),
        })
    }

    #[must_use]
    pub fn runout_sensors(&self) -> Vec<RunoutSensor> {
        self.printer
            .keys()
            .map(|key| classify(key))
            .filter(|key| key.kind == ObjectKind::FilamentSwitchSensor && key.namespaced)
            .filter_map(|key| self.runout_sensor_by_name(&key.name))
            .collect()
    }

    #[must_use]
    pub fn supports_bed_mesh(&self) -> bool {
        is_truthy(
            self.field("configfile", "config")
                .and_then(|config| config.get("bed_mesh")),
        )
    }

    /// Stored mesh profiles, sorted case-insensitively with `default` last.
    #[must_use]
    pub fn bed_meshes(&self) -> Vec<BedMesh> {
        let current = self.printer_str("bed_mesh", "profile_name");
        let Some(config) = self
            .field("configfile", "config")
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };

        let mut meshes: Vec<BedMesh> = config
            .keys()
            .map(|key| classify(key))
            .filter(|key| key.kind == ObjectKind::BedMesh && key.namespaced)
            .map(|key| BedMesh {
                active: key.name == current,
                profile_name: key.name,
            })
            .collect();

        meshes.sort_by(|a, b| {
            let a_default = a.profile_name == "default";
            let b_default = b.profile_name == "default";
            a_default.cmp(&b_default).then_with(|| {
                a.profile_name
                    .to_lowercase()
                    .cmp(&b.profile_name.to_lowercase())
            })
        });
        meshes
    }

    #[must_use]
    pub fn endstops(&self) -> lunadeck_types::Endstops {
        self.endstops.clone()
    }

    /// Heaters listed in `heaters.available_heaters`, sorted by name.
    #[must_use]
    pub fn heaters(&self) -> Vec<Heater> {
        let Some(available) = self
            .field("heaters", "available_heaters")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        let mut heaters: Vec<Heater> = available
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|key| {
                let live = self.object(key).filter(|object| !object.is_empty())?;
                let config = self.config_section(key);
                let parsed = classify(key);
                let name = if parsed.kind == ObjectKind::HeaterGeneric && parsed.namespaced {
                    parsed.name
                } else {
                    key.to_string()
                };
                Some(Heater {
                    name,
                    key: key.to_string(),
                    temperature: f64_field(live, "temperature"),
                    target: f64_field(live, "target"),
                    power: f64_field(live, "power"),
                    min_temp: temp_limit(config, "min_temp"),
                    max_temp: temp_limit(config, "max_temp"),
                    properties: merged(live, config),
                })
            })
            .collect();

        heaters.sort_by(|a, b| by_name_ignore_case(&a.name, &b.name));
        heaters
    }

    /// Fans whose type is in `filter`, or every known fan type when the
    /// filter is empty.
    #[must_use]
    pub fn fans(&self, filter: &[&str]) -> Vec<Fan> {
        let supported: &[&str] = if filter.is_empty() {
            &DEFAULT_FANS
        } else {
            filter
        };

        self.printer
            .iter()
            .filter_map(|(key, live)| {
                let parsed = classify(key);
                if !supported.contains(&parsed.kind.as_str()) {
                    return None;
                }
                let live = live.as_object()?;
                let config = self.config_section(key);

                let mut pretty_name = if parsed.name == "fan" {
                    "Part Fan".to_string()
                } else {
                    start_case(&parsed.name)
                };
                if !parsed.name.ends_with("fan") {
                    pretty_name.push_str(" Fan");
                }

                Some(Fan {
                    pretty_name,
                    key: key.clone(),
                    kind: parsed.kind.as_str().to_string(),
                    controllable: parsed.kind.is_controllable_fan(),
                    speed: f64_field(live, "speed"),
                    rpm: live.get("rpm").and_then(Value::as_f64),
                    min_temp: temp_limit(config, "min_temp"),
                    max_temp: temp_limit(config, "max_temp"),
                    properties: merged(live, config),
                    name: parsed.name,
                })
            })
            .collect()
    }

    /// Temperature sensors and probes.
    #[must_use]
    pub fn sensors(&self) -> Vec<Sensor> {
        self.printer
            .iter()
            .filter_map(|(key, live)| {
                let parsed = classify(key);
                if !parsed.kind.is_temperature_sensor() {
                    return None;
                }
                let live = live.as_object()?;
                let config = self.config_section(key);
                Some(Sensor {
                    key: key.clone(),
                    kind: parsed.kind.as_str().to_string(),
                    temperature: f64_field(live, "temperature"),
                    min_temp: temp_limit(config, "min_temp"),
                    max_temp: temp_limit(config, "max_temp"),
                    properties: merged(live, config),
                    name: parsed.name,
                })
            })
            .collect()
    }

    /// Every `gcode_macro` the printer reports, by name, with its
    /// visibility given the `hidden` list.
    #[must_use]
    pub fn macros(&self, hidden: &[String]) -> Vec<Macro> {
        let mut names: Vec<String> = self
            .objects
            .iter()
            .chain(self.printer.keys())
            .map(|key| classify(key))
            .filter(|key| key.kind == ObjectKind::GcodeMacro && key.namespaced)
            .map(|key| key.name)
            .collect();
        names.sort_by(|a, b| by_name_ignore_case(a, b));
        names.dedup();

        names
            .into_iter()
            .map(|name| Macro {
                visible: !hidden.contains(&name),
                name,
            })
            .collect()
    }

    #[must_use]
    pub fn visible_macros(&self, hidden: &[String]) -> Vec<String> {
        self.macros(hidden)
            .into_iter()
            .filter(|m| m.visible)
            .map(|m| m.name)
            .collect()
    }

    #[must_use]
    pub fn chart_data(&self) -> Chart {
        Chart {
            labels: Vec::new(),
            datasets: self.chart.iter().map(dataset).collect(),
        }
    }
}
