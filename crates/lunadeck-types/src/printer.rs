//! Printer object key classification.
//!
//! Klipper names its objects either plainly (`toolhead`, `extruder`, `fan`)
//! or as `"<type> <name>"` (`heater_generic chamber`). Only the first space
//! separates the two; anything after it, spaces included, is the name.

/// Object types this layer knows how to project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    HeaterGeneric,
    TemperatureFan,
    ControllerFan,
    HeaterFan,
    FanGeneric,
    Fan,
    TemperatureSensor,
    TemperatureProbe,
    FilamentSwitchSensor,
    BedMesh,
    GcodeMacro,
    /// Anything else, carrying the raw type token.
    Other(String),
}

impl ObjectKind {
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "heater_generic" => Self::HeaterGeneric,
            "temperature_fan" => Self::TemperatureFan,
            "controller_fan" => Self::ControllerFan,
            "heater_fan" => Self::HeaterFan,
            "fan_generic" => Self::FanGeneric,
            "fan" => Self::Fan,
            "temperature_sensor" => Self::TemperatureSensor,
            "temperature_probe" => Self::TemperatureProbe,
            "filament_switch_sensor" => Self::FilamentSwitchSensor,
            "bed_mesh" => Self::BedMesh,
            "gcode_macro" => Self::GcodeMacro,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::HeaterGeneric => "heater_generic",
            Self::TemperatureFan => "temperature_fan",
            Self::ControllerFan => "controller_fan",
            Self::HeaterFan => "heater_fan",
            Self::FanGeneric => "fan_generic",
            Self::Fan => "fan",
            Self::TemperatureSensor => "temperature_sensor",
            Self::TemperatureProbe => "temperature_probe",
            Self::FilamentSwitchSensor => "filament_switch_sensor",
            Self::BedMesh => "bed_mesh",
            Self::GcodeMacro => "gcode_macro",
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_fan(&self) -> bool {
        matches!(
            self,
            Self::TemperatureFan | Self::ControllerFan | Self::HeaterFan | Self::FanGeneric | Self::Fan
        )
    }

    #[must_use]
    pub fn is_temperature_sensor(&self) -> bool {
        matches!(self, Self::TemperatureSensor | Self::TemperatureProbe)
    }

    /// Only the part cooling fan accepts speed changes from the dashboard.
    #[must_use]
    pub fn is_controllable_fan(&self) -> bool {
        matches!(self, Self::Fan)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed printer object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    /// Instance name, or the whole key when it has no namespace.
    pub name: String,
    /// True when the key had a `"<type> <name>"` shape.
    pub namespaced: bool,
}

/// Split a printer object key on its first space.
#[must_use]
pub fn classify(key: &str) -> ObjectKey {
    match key.split_once(' ') {
        Some((prefix, name)) => ObjectKey {
            kind: ObjectKind::from_prefix(prefix),
            name: name.to_string(),
            namespaced: true,
        },
        None => ObjectKey {
            kind: ObjectKind::from_prefix(key),
            name: key.to_string(),
            namespaced: false,
        },
    }
}
