//! Producers run simulated devices sending messages to the protocol adapters.
/// Controller for the SimulatorProducer CRD.
#[cfg(feature = "controller")]
pub mod controller;
/// Spec of the SimulatorProducer CRD.
pub mod spec;
#[cfg(feature = "controller")]
pub(crate) mod workload;

pub use spec::*;
