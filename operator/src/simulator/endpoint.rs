//! Endpoint settings of a simulator, published as a ConfigMap and a Secret of the same name.
//!
//! Producers and consumers read these through env var references.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{ConfigMap, Secret},
    ByteString,
};

use crate::{
    install::{
        corev1::{reconcile_config_map, reconcile_secret},
        simple, InstallContext, MixIn, ReconcileResult,
    },
    simulator::EndpointSpec,
    utils::Error,
};

/// Key of the CA certificate in the settings Secret.
pub const CA_CERTIFICATE_KEY: &str = "ca.crt";

/// Non secret settings.
pub fn config_map_data(endpoint: &EndpointSpec) -> BTreeMap<String, String> {
    BTreeMap::from_iter(
        [
            ("endpoint.host", endpoint.messaging.host.clone()),
            ("endpoint.port", endpoint.messaging.port.to_string()),
            ("deviceRegistry.url", endpoint.registry.url.clone()),
            ("httpAdapter.url", endpoint.adapters.http.url.clone()),
            ("mqttAdapter.host", endpoint.adapters.mqtt.host.clone()),
            ("mqttAdapter.port", endpoint.adapters.mqtt.port.to_string()),
        ]
        .map(|(key, value)| (key.to_owned(), value)),
    )
}

/// Credentials and the optional CA certificate.
pub fn secret_data(endpoint: &EndpointSpec) -> BTreeMap<String, ByteString> {
    let messaging = &endpoint.messaging;
    let mut data = BTreeMap::from_iter([
        (
            "endpoint.username".to_owned(),
            ByteString(messaging.user.clone().into_bytes()),
        ),
        (
            "endpoint.password".to_owned(),
            ByteString(messaging.password.clone().into_bytes()),
        ),
    ]);
    if let Some(ca) = &messaging.ca_certificate {
        data.insert(CA_CERTIFICATE_KEY.to_owned(), ca.clone());
    }
    data
}

/// Publish the endpoint settings.
///
/// Without an endpoint both objects fail, the rest of the simulator is still reconciled.
pub async fn reconcile_endpoint(
    cx: &InstallContext<'_>,
    name: &str,
    endpoint: Option<&EndpointSpec>,
    mixins: &[MixIn],
    result: &mut ReconcileResult,
) {
    let Some(endpoint) = endpoint else {
        for kind in ["ConfigMap", "Secret"] {
            result.process::<()>(Err(Error::Config(format!(
                "{kind} {name}: no endpoint on the simulator and no SIMULATOR_CONFIG"
            ))));
        }
        return;
    };

    result.process(
        reconcile_config_map(
            cx,
            name,
            simple(|config_map: &mut ConfigMap| {
                config_map.data = Some(config_map_data(endpoint));
                Ok(())
            }),
            mixins,
        )
        .await,
    );
    result.process(
        reconcile_secret(
            cx,
            name,
            simple(|secret: &mut Secret| {
                secret.data = Some(secret_data(endpoint));
                Ok(())
            }),
            mixins,
        )
        .await,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_map_keys() {
        expect_test::expect![[r#"
            {
                "deviceRegistry.url": "https://registry.hono.svc:8443",
                "endpoint.host": "messaging.hono.svc",
                "endpoint.port": "5671",
                "httpAdapter.url": "https://http.hono.svc:8443",
                "mqttAdapter.host": "mqtt.hono.svc",
                "mqttAdapter.port": "8883",
            }
        "#]]
        .assert_debug_eq(&config_map_data(&EndpointSpec::test()));
    }

    #[test]
    fn ca_only_when_given() {
        let mut endpoint = EndpointSpec::test();
        let keys: Vec<_> = secret_data(&endpoint).into_keys().collect();
        assert_eq!(keys, vec!["endpoint.password", "endpoint.username"]);

        endpoint.messaging.ca_certificate = Some(ByteString(b"-----BEGIN CERTIFICATE-----".to_vec()));
        let data = secret_data(&endpoint);
        assert_eq!(
            data.get(CA_CERTIFICATE_KEY),
            Some(&ByteString(b"-----BEGIN CERTIFICATE-----".to_vec()))
        );
        assert_eq!(
            data.get("endpoint.username"),
            Some(&ByteString(b"consumer@HONO".to_vec()))
        );
    }
}
