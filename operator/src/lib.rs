//! Provides API for the IoT simulator operator and related tooling.
#![warn(missing_docs)]

/// Operator wide settings.
#[cfg(feature = "controller")]
pub mod config;
/// Consumer module, reading telemetry from the messaging endpoint.
pub mod consumer;
/// Create-or-update of derived objects.
#[cfg(feature = "controller")]
pub mod install;
/// Labels module for managing resource labels.
#[cfg(feature = "controller")]
pub(crate) mod labels;
/// Monitoring module for the prometheus stack of a simulator.
pub mod monitoring;
/// OpenShift resource kinds the operator writes.
#[cfg(feature = "controller")]
pub mod openshift;
/// Detection of the cluster flavour.
#[cfg(feature = "controller")]
pub mod platform;
/// Producer module, sending telemetry and events to the protocol adapters.
pub mod producer;
/// Settings propagation into the workloads.
#[cfg(feature = "controller")]
pub mod settings;
/// Simulator module, the backend endpoint and console shared by producers and consumers.
pub mod simulator;
/// Utils module for shared utility functions.
#[cfg(feature = "controller")]
pub mod utils;
/// Workload objects shared by producers and consumers.
#[cfg(feature = "controller")]
pub mod workload;

/// Field manager and label value of everything the operator writes
#[cfg(feature = "controller")]
const CONTROLLER_NAME: &str = "iot-simulator-operator";
