//! Place all spec types into a single module so they can be used as a lightweight dependency
use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Primary CRD describing the backend a set of producers and consumers work against.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "iot.dentrassi.de",
    version = "v1alpha1",
    kind = "Simulator",
    plural = "simulators",
    status = "SimulatorStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorSpec {
    /// Endpoints of the backend.
    /// When unset the endpoint configured on the operator is used.
    pub endpoint: Option<EndpointSpec>,
    /// Git sources of the OpenShift builds, keyed by repository name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub builds: BTreeMap<String, BuildSpec>,
}

/// Status of a simulator, currently empty.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct SimulatorStatus {}

/// Connection data of the messaging and device management backend.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    /// AMQP messaging network consumers connect to.
    #[serde(default)]
    pub messaging: MessagingSpec,
    /// Device registry producers register their devices with.
    #[serde(default)]
    pub registry: RegistrySpec,
    /// Protocol adapters producers send to.
    #[serde(default)]
    pub adapters: AdaptersSpec,
}

/// AMQP messaging endpoint.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagingSpec {
    /// Host name
    #[serde(default)]
    pub host: String,
    /// Port
    #[serde(default)]
    pub port: u16,
    /// User name
    #[serde(default)]
    pub user: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// PEM encoded CA certificate to trust, base64 encoded
    #[schemars(with = "Option<String>")]
    pub ca_certificate: Option<ByteString>,
}

/// Device registry endpoint.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct RegistrySpec {
    /// Base URL
    #[serde(default)]
    pub url: String,
}

/// Protocol adapter endpoints.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct AdaptersSpec {
    /// HTTP adapter
    #[serde(default)]
    pub http: HttpAdapterSpec,
    /// MQTT adapter
    #[serde(default)]
    pub mqtt: MqttAdapterSpec,
}

/// HTTP protocol adapter.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct HttpAdapterSpec {
    /// Base URL
    #[serde(default)]
    pub url: String,
}

/// MQTT protocol adapter.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct MqttAdapterSpec {
    /// Host name
    #[serde(default)]
    pub host: String,
    /// Port
    #[serde(default)]
    pub port: u16,
}

/// Overrides for a single build.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct BuildSpec {
    /// Git source
    #[serde(default)]
    pub git: GitSpec,
}

/// Git repository and reference to build from.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct GitSpec {
    /// Repository URI, defaults to the operator's git prefix followed by the repository name
    pub uri: Option<String>,
    /// Branch, tag or commit, defaults to the operator's git reference
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use super::*;

    #[test]
    fn ca_certificate_is_a_string_in_the_crd() {
        let crd = serde_json::to_value(Simulator::crd()).unwrap();
        let messaging = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]
            ["spec"]["properties"]["endpoint"]["properties"]["messaging"]["properties"];
        let ca = &messaging["caCertificate"];
        assert_eq!(ca["type"], "string");
        assert_eq!(
            ca["description"],
            "PEM encoded CA certificate to trust, base64 encoded"
        );
        assert_eq!(messaging["password"]["type"], "string");
    }
}
