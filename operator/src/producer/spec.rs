//! Place all spec types into a single module so they can be used as a lightweight dependency
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CRD for a deployment of simulated devices sending messages.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "iot.dentrassi.de",
    version = "v1alpha1",
    kind = "SimulatorProducer",
    plural = "simulatorproducers",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorProducerSpec {
    /// Name of the Simulator providing the endpoint settings
    #[serde(default)]
    pub simulator: String,
    /// Tenant the devices belong to
    #[serde(default)]
    pub tenant: String,
    /// Type of messages to send, defaults to `telemetry`
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    /// Number of pods, defaults to 1
    pub replicas: Option<i32>,
    /// Number of devices simulated by each pod
    #[serde(default)]
    pub number_of_devices: u32,
    /// Number of sender threads in each pod
    pub number_of_threads: Option<u32>,
    /// Protocol used to talk to the protocol adapter, defaults to `http`
    pub protocol: Option<Protocol>,
}

/// Protocol a producer sends with.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTP adapter
    #[default]
    Http,
    /// MQTT adapter
    Mqtt,
}

impl Protocol {
    /// Name used in labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Mqtt => "mqtt",
        }
    }
}
