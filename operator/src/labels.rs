use std::collections::BTreeMap;

/// Name of the simulator a resource belongs to.
pub const SIMULATOR_LABEL: &str = "iot.simulator";
/// Tenant a workload sends or consumes messages for.
pub const TENANT_LABEL: &str = "iot.simulator.tenant";
/// Role of a workload, i.e. `producer` or `consumer`.
pub const APP_ROLE_LABEL: &str = "iot.simulator.app";
/// Message type a workload handles.
pub const MESSAGE_TYPE_LABEL: &str = "iot.simulator.message.type";
/// Protocol a producer uses to talk to the protocol adapters.
pub const PROTOCOL_LABEL: &str = "iot.simulator.producer.protocol";
/// Name of the settings (ConfigMap and Secret) a pod template depends on.
pub const SETTINGS_LABEL: &str = "iot.simulator.settings";
/// Marks services scraped by a simulator's prometheus instance.
pub const METRICS_LABEL: &str = "metrics";

/// Manage by label
pub const MANAGED_BY_LABEL_SELECTOR: &str = "managed-by=iot-simulator-operator";

/// Labels that indicate the resource is managed by the iot simulator operator.
pub fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from_iter(vec![(
        "managed-by".to_owned(),
        "iot-simulator-operator".to_owned(),
    )])
}

/// Create labels that can be used as a unique selector for a workload of an instance.
pub fn selector_labels(app: &str, deployment: &str) -> BTreeMap<String, String> {
    BTreeMap::from_iter(vec![
        ("app".to_owned(), app.to_owned()),
        ("deploymentconfig".to_owned(), deployment.to_owned()),
    ])
}

/// Build a label selector string matching a single label value.
pub fn label_selector(key: &str, value: &str) -> String {
    format!("{key}={value}")
}
