use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Deserialize a Vec that may be null or missing (both become empty vec)
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Portable configuration, saved alongside the printer and shared between
/// every browser or terminal that connects to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_true")]
    pub chart_visible: bool,

    #[serde(default = "default_true")]
    pub hide_temp_waits: bool,

    #[serde(default = "default_extrude_length")]
    pub default_extrude_length: f64,

    #[serde(default = "default_extrude_speed")]
    pub default_extrude_speed: f64,

    #[serde(default = "default_toolhead_move_length")]
    pub default_toolhead_move_length: f64,

    #[serde(
        rename = "defaultToolheadXYSpeed",
        default = "default_toolhead_xy_speed"
    )]
    pub default_toolhead_xy_speed: f64,

    #[serde(default = "default_toolhead_z_speed")]
    pub default_toolhead_z_speed: f64,

    #[serde(default)]
    pub use_gcode_coords: bool,

    #[serde(default = "default_z_adjust_distances")]
    pub z_adjust_distances: Vec<f64>,
}

fn default_instance_name() -> String {
    "Lunadeck".to_string()
}
fn default_true() -> bool {
    true
}
fn default_extrude_length() -> f64 {
    10.0
}
fn default_extrude_speed() -> f64 {
    5.0
}
fn default_toolhead_move_length() -> f64 {
    1.0
}
fn default_toolhead_xy_speed() -> f64 {
    100.0
}
fn default_toolhead_z_speed() -> f64 {
    20.0
}
fn default_z_adjust_distances() -> Vec<f64> {
    vec![0.005, 0.01, 0.025, 0.05]
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            chart_visible: true,
            hide_temp_waits: true,
            default_extrude_length: default_extrude_length(),
            default_extrude_speed: default_extrude_speed(),
            default_toolhead_move_length: default_toolhead_move_length(),
            default_toolhead_xy_speed: default_toolhead_xy_speed(),
            default_toolhead_z_speed: default_toolhead_z_speed(),
            use_gcode_coords: false,
            z_adjust_distances: default_z_adjust_distances(),
        }
    }
}

/// Webcam settings. `url` is usually a path relative to the printer host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(rename = "type", default = "default_camera_type")]
    pub kind: String,

    #[serde(default = "default_camera_url")]
    pub url: String,

    #[serde(default)]
    pub flip_x: bool,

    #[serde(default)]
    pub flip_y: bool,
}

fn default_camera_type() -> String {
    "mjpgstreamer".to_string()
}

fn default_camera_url() -> String {
    "/webcam/?action=stream".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: default_camera_type(),
            url: default_camera_url(),
            flip_x: false,
            flip_y: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Macro names hidden from the dashboard, in the order they were hidden.
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub hidden_macros: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub temp_presets: Vec<TempPreset>,
}

/// A named set of target temperatures / fan speeds applied together.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempPreset {
    pub name: String,

    /// Keyed by heater or fan object name (e.g. `extruder`, `heater_bed`).
    #[serde(default)]
    pub values: BTreeMap<String, PresetValue>,

    #[serde(default)]
    pub gcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetValue {
    pub value: f64,

    #[serde(rename = "type", default = "default_preset_type")]
    pub kind: String,

    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_preset_type() -> String {
    "heater".to_string()
}

/// Per-client configuration overlay.
///
/// The shape is open-ended: saving merges the top level of the payload over
/// the current value, so nested objects are replaced rather than merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalConfig(pub Map<String, Value>);

impl LocalConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Shallow merge: every top-level key of `other` overwrites ours.
    #[must_use]
    pub fn merged(&self, other: &LocalConfig) -> LocalConfig {
        let mut map = self.0.clone();
        for (key, value) in &other.0 {
            map.insert(key.clone(), value.clone());
        }
        LocalConfig(map)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn dark_mode(&self) -> Option<bool> {
        self.0.get("darkMode").and_then(Value::as_bool)
    }
}

impl From<Map<String, Value>> for LocalConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
