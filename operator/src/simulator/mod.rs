//! The Simulator ties producers and consumers to a backend and runs the shared console and
//! monitoring stack.
#[cfg(feature = "controller")]
pub(crate) mod builds;
#[cfg(feature = "controller")]
pub(crate) mod console;
/// Controller for the Simulator CRD.
#[cfg(feature = "controller")]
pub mod controller;
#[cfg(feature = "controller")]
pub(crate) mod endpoint;
/// Spec of the Simulator CRD.
pub mod spec;

pub use spec::*;
