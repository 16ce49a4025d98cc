//! Test module for lunadeck-core
//!
//! Scenario suites for:
//! - Config reducer (file, local, generic saves, macros, presets)
//! - Instance registry persistence
//! - File and memory storage backends
//! - Telemetry projection over a sample printer
//! - Store snapshots and inbound event routing

// Test modules use exact float comparisons
#![allow(clippy::float_cmp)]

mod getters_tests;
mod store_tests;
