//! Consumers read the messages sent by producers back from the messaging network.
/// Controller for the SimulatorConsumer CRD.
#[cfg(feature = "controller")]
pub mod controller;
/// Spec of the SimulatorConsumer CRD.
pub mod spec;
#[cfg(feature = "controller")]
pub(crate) mod workload;

pub use spec::*;
