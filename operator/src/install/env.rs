//! Helpers for building container environment variables.
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, EnvVar, EnvVarSource, ObjectFieldSelector, SecretKeySelector,
};

/// A plain value.
pub fn value(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// A value taken from a field of the pod, e.g. `metadata.namespace`.
pub fn from_field(name: &str, field_path: &str) -> EnvVar {
    from_source(
        name,
        EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_owned()),
                field_path: field_path.to_owned(),
            }),
            ..Default::default()
        },
    )
}

/// A value taken from a label of the pod.
pub fn from_label(name: &str, label: &str) -> EnvVar {
    from_field(name, &format!("metadata.labels['{label}']"))
}

/// The namespace the pod runs in.
pub fn namespace(name: &str) -> EnvVar {
    from_field(name, "metadata.namespace")
}

/// A key of a ConfigMap.
pub fn from_config_map(name: &str, config_map: &str, key: &str) -> EnvVar {
    from_source(
        name,
        EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: Some(config_map.to_owned()),
                key: key.to_owned(),
                optional: None,
            }),
            ..Default::default()
        },
    )
}

/// A key of a Secret.
pub fn from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    from_source(
        name,
        EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(secret.to_owned()),
                key: key.to_owned(),
                optional: None,
            }),
            ..Default::default()
        },
    )
}

fn from_source(name: &str, source: EnvVarSource) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: None,
        value_from: Some(source),
    }
}
