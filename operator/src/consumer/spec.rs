//! Place all spec types into a single module so they can be used as a lightweight dependency
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CRD for a deployment of clients consuming messages from the messaging network.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "iot.dentrassi.de",
    version = "v1alpha1",
    kind = "SimulatorConsumer",
    plural = "simulatorconsumers",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConsumerSpec {
    /// Name of the Simulator providing the endpoint settings
    #[serde(default)]
    pub simulator: String,
    /// Tenant to consume messages of
    #[serde(default)]
    pub tenant: String,
    /// Type of messages to consume, defaults to `telemetry`
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    /// Number of pods, defaults to 1
    pub replicas: Option<i32>,
}
