//! Read-side view models derived from the printer object graph.
//!
//! None of these are persisted; they are rebuilt on every read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heater {
    /// Display name (`chamber` for `heater_generic chamber`).
    pub name: String,
    /// Printer object key this was built from.
    pub key: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub power: f64,
    pub min_temp: Option<i64>,
    pub max_temp: Option<i64>,
    /// Live object merged with its config section.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fan {
    pub name: String,
    pub key: String,
    pub pretty_name: String,
    /// Type token, e.g. `heater_fan`.
    #[serde(rename = "type")]
    pub kind: String,
    pub controllable: bool,
    #[serde(default)]
    pub speed: f64,
    pub rpm: Option<f64>,
    pub min_temp: Option<i64>,
    pub max_temp: Option<i64>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub temperature: f64,
    pub min_temp: Option<i64>,
    pub max_temp: Option<i64>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunoutSensor {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub filament_detected: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedMesh {
    pub profile_name: String,
    pub active: bool,
}

/// Endstop name to state (`open` / `TRIGGERED`), sorted by name.
pub type Endstops = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macro {
    pub name: String,
    pub visible: bool,
}

/// How the total print time is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateKind {
    /// Slicer's own estimate from file metadata.
    Slicer,
    /// Print duration scaled by file progress.
    #[default]
    File,
    /// Print duration scaled by filament used against filament total.
    Filament,
    Totals,
}

impl EstimateKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slicer => "slicer",
            Self::File => "file",
            Self::Filament => "filament",
            Self::Totals => "totals",
        }
    }
}

impl FromStr for EstimateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slicer" => Ok(Self::Slicer),
            "file" => Ok(Self::File),
            "filament" => Ok(Self::Filament),
            "totals" => Ok(Self::Totals),
            other => Err(format!("unknown estimate type: {other}")),
        }
    }
}

impl std::fmt::Display for EstimateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatted print time estimates. The `*_secs` fields carry the raw,
/// already sanitized numbers behind each formatted string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEstimates {
    #[serde(rename = "type")]
    pub kind: EstimateKind,
    /// Whole percent, e.g. `"42"`.
    pub progress: String,
    pub time_left: String,
    pub duration: String,
    pub total_duration: String,
    pub time_left_secs: f64,
    pub duration_secs: f64,
    pub total_duration_secs: f64,
}

/// One sample; `x` is a unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: i64,
    pub y: f64,
}

/// A tracked telemetry channel before styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub data: Vec<ChartPoint>,
    #[serde(default)]
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataSet {
    pub data: Vec<ChartPoint>,
    pub label: String,
    pub display: bool,
    pub radius: f64,
    pub span_gaps: bool,
    pub border_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chart {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_kind_parse() {
        assert_eq!("slicer".parse::<EstimateKind>(), Ok(EstimateKind::Slicer));
        assert_eq!("filament".parse::<EstimateKind>(), Ok(EstimateKind::Filament));
        assert!("bogus".parse::<EstimateKind>().is_err());
    }

    #[test]
    fn test_estimate_kind_serialization() {
        let json = serde_json::to_string(&EstimateKind::Totals).unwrap();
        assert_eq!(json, "\"totals\"");
    }

    #[test]
    fn test_chart_dataset_skips_missing_colors() {
        let set = ChartDataSet {
            data: vec![ChartPoint { x: 1, y: 20.5 }],
            label: "mcu".to_string(),
            display: false,
            radius: 0.0,
            span_gaps: true,
            border_width: 1,
            fill: None,
            border_color: None,
            background_color: None,
        };
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"spanGaps\":true"));
        assert!(!json.contains("borderColor"));
        assert!(!json.contains("fill"));
    }

    #[test]
    fn test_fan_type_field_name() {
        let fan = Fan {
            name: "hotend".to_string(),
            key: "heater_fan hotend".to_string(),
            pretty_name: "Hotend Fan".to_string(),
            kind: "heater_fan".to_string(),
            controllable: false,
            speed: 1.0,
            rpm: None,
            min_temp: None,
            max_temp: None,
            properties: Map::new(),
        };
        let json = serde_json::to_string(&fan).unwrap();
        assert!(json.contains("\"type\":\"heater_fan\""));
        assert!(json.contains("\"prettyName\":\"Hotend Fan\""));
    }
}
