//! Shared types for lunadeck components.
//!
//! This crate provides the types used across lunadeck-core, lunadeck-rpc and
//! lunadeck-cli. All types are serializable so they can be persisted to local
//! storage or carried over the socket.

mod config;
mod instance;
mod notification;
mod printer;
mod view;

pub use config::{
    CameraConfig, DashboardConfig, FileConfig, GeneralConfig, LocalConfig, PresetValue,
    TempPreset,
};
pub use instance::{ApiConfig, Instance, InstanceName};
pub use notification::ServerNotification;
pub use printer::{ObjectKey, ObjectKind, classify};
pub use view::{
    BedMesh, Chart, ChartDataSet, ChartPoint, ChartSeries, Endstops, EstimateKind, Fan, Heater,
    Macro, RunoutSensor, Sensor, TimeEstimates,
};
