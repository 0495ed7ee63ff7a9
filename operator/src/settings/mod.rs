//! Settings propagation.
//!
//! Workloads read the simulator's ConfigMap and Secret through env var references, which do not
//! change when the referenced data changes. A digest of the data is stamped on the pod template of
//! every workload labelled with the settings name, so the pods roll when the settings change.
/// Controller stamping the settings digest on workloads.
pub mod controller;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use sha2::{Digest, Sha256};

/// Pod template annotation holding the digest of the settings a workload was started with.
pub const SETTINGS_DIGEST_ANNOTATION: &str = "iot.simulator.dentrassi.de/settings-digest";

/// Hex encoded SHA-256 over the ConfigMap data and, if present, the Secret data.
///
/// Keys are fed in sorted order with separators, so equal data always yields the same digest.
pub fn settings_digest(config_map: &ConfigMap, secret: Option<&Secret>) -> String {
    let mut bytes = Vec::new();
    let mut push = |key: &str, value: &[u8]| {
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(value);
        bytes.push(0);
    };

    for (key, value) in config_map.data.iter().flatten() {
        push(key, value.as_bytes());
    }
    for (key, value) in config_map.binary_data.iter().flatten() {
        push(key, &value.0);
    }
    if let Some(secret) = secret {
        push("", b"secret");
        for (key, value) in secret.data.iter().flatten() {
            push(key, &value.0);
        }
    }

    hex::encode(Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::ByteString;

    use super::*;

    fn config_map(host: &str) -> ConfigMap {
        ConfigMap {
            data: Some(BTreeMap::from_iter([(
                "endpoint.host".to_owned(),
                host.to_owned(),
            )])),
            ..Default::default()
        }
    }

    fn secret(password: &str) -> Secret {
        Secret {
            data: Some(BTreeMap::from_iter([(
                "endpoint.password".to_owned(),
                ByteString(password.as_bytes().to_vec()),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn digest_follows_data() {
        let digest = settings_digest(&config_map("a"), Some(&secret("p")));
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, settings_digest(&config_map("a"), Some(&secret("p"))));
        assert_ne!(digest, settings_digest(&config_map("b"), Some(&secret("p"))));
        assert_ne!(digest, settings_digest(&config_map("a"), Some(&secret("q"))));
        assert_ne!(digest, settings_digest(&config_map("a"), None));
    }

    #[test]
    fn empty_settings() {
        expect_test::expect!["e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"]
            .assert_eq(&settings_digest(&ConfigMap::default(), None));
    }
}
