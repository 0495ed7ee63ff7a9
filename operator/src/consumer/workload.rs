use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    EnvVar, PodSpec, PodTemplateSpec, Secret, SecretVolumeSource, Volume, VolumeMount,
};
use kube::Api;

use crate::{
    consumer::SimulatorConsumer,
    install::{env, Applied, InstallContext, MixIn},
    labels::{
        selector_labels, APP_ROLE_LABEL, MESSAGE_TYPE_LABEL, SETTINGS_LABEL, SIMULATOR_LABEL,
        TENANT_LABEL,
    },
    simulator::endpoint::CA_CERTIFICATE_KEY,
    utils::Error,
    workload::{
        apply_probe, instance_name, java_command, merge_labels, metrics_container_port,
        parent_image_stream, reconcile_workload, settings_name, single_container, workload_name,
        SimulatorComponent, Workload,
    },
};

pub const CONTAINER_NAME: &str = "consumer";
const WORKLOAD_PREFIX: &str = "con";
const SECRETS_VOLUME: &str = "secrets-volume";
const SECRETS_PATH: &str = "/etc/secrets";

/// Name of the Deployment or DeploymentConfig and the metrics Service of a consumer.
pub fn consumer_workload_name(consumer: &SimulatorConsumer) -> String {
    workload_name(
        WORKLOAD_PREFIX,
        consumer.metadata.name.as_deref().unwrap_or_default(),
    )
}

fn pod_labels(consumer: &SimulatorConsumer, workload: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(&instance_name(consumer.simulator()), workload);
    labels.extend([
        (TENANT_LABEL.to_owned(), consumer.tenant().to_owned()),
        (SIMULATOR_LABEL.to_owned(), consumer.simulator().to_owned()),
        (
            SETTINGS_LABEL.to_owned(),
            settings_name(consumer.simulator()),
        ),
    ]);
    labels
}

fn workload_labels(consumer: &SimulatorConsumer, workload: &str) -> BTreeMap<String, String> {
    let mut labels = pod_labels(consumer, workload);
    labels.insert(APP_ROLE_LABEL.to_owned(), CONTAINER_NAME.to_owned());
    labels.insert(
        MESSAGE_TYPE_LABEL.to_owned(),
        consumer.message_type().to_owned(),
    );
    labels
}

fn consumer_env(consumer: &SimulatorConsumer, trusts_ca: bool) -> Vec<EnvVar> {
    let settings = settings_name(consumer.simulator());
    let mut vars = vec![env::value("CONSUMING", consumer.message_type())];
    if trusts_ca {
        vars.push(env::value(
            "HONO_TRUSTED_CERTS",
            format!("{SECRETS_PATH}/{CA_CERTIFICATE_KEY}"),
        ));
    }
    vars.extend([
        env::value("HONO_INITIAL_CREDITS", "100"),
        env::from_label("HONO_TENANT", TENANT_LABEL),
        env::from_secret("HONO_USER", &settings, "endpoint.username"),
        env::from_secret("HONO_PASSWORD", &settings, "endpoint.password"),
        env::from_config_map("MESSAGING_SERVICE_HOST", &settings, "endpoint.host"),
        env::from_config_map("MESSAGING_SERVICE_PORT_AMQP", &settings, "endpoint.port"),
    ]);
    vars
}

// Keeps server defaults such as the default mode of an existing volume.
fn set_secrets_volume(pod: &mut PodSpec, secret: &str) {
    let volumes = pod.volumes.get_or_insert_with(Vec::new);
    if volumes.len() != 1 {
        *volumes = vec![Volume::default()];
    }
    let volume = &mut volumes[0];
    volume.name = SECRETS_VOLUME.to_owned();
    volume
        .secret
        .get_or_insert_with(SecretVolumeSource::default)
        .secret_name = Some(secret.to_owned());
}

/// Bring the pod template of a consumer into shape.
///
/// The trusted certificates are only configured when the settings Secret carries a CA.
pub fn configure_pod(
    consumer: &SimulatorConsumer,
    workload: &str,
    trusts_ca: bool,
    template: &mut PodTemplateSpec,
) {
    merge_labels(
        &mut template.metadata.get_or_insert_with(Default::default).labels,
        &pod_labels(consumer, workload),
    );

    let container = single_container(template, CONTAINER_NAME);
    container.command = Some(java_command(
        &["-Xmx1024m"],
        "/build/simulator-consumer/target/simulator-consumer-app.jar",
    ));
    container.env = Some(consumer_env(consumer, trusts_ca));
    container.ports = Some(vec![metrics_container_port()]);
    container.volume_mounts = Some(vec![VolumeMount {
        name: SECRETS_VOLUME.to_owned(),
        mount_path: SECRETS_PATH.to_owned(),
        ..Default::default()
    }]);
    apply_probe(&mut container.liveness_probe);
    apply_probe(&mut container.readiness_probe);

    if let Some(pod) = template.spec.as_mut() {
        set_secrets_volume(pod, &settings_name(consumer.simulator()));
    }
}

/// Create or update the Deployment or DeploymentConfig of a consumer.
pub async fn reconcile_consumer_workload(
    cx: &InstallContext<'_>,
    consumer: &SimulatorConsumer,
    mixins: &[MixIn],
) -> Result<Applied, Error> {
    let name = consumer_workload_name(consumer);
    let instance = instance_name(consumer.simulator());
    let secrets: Api<Secret> = Api::namespaced(cx.client.clone(), cx.namespace);
    let trusts_ca = secrets
        .get_opt(&settings_name(consumer.simulator()))
        .await?
        .and_then(|secret| secret.data)
        .is_some_and(|data| data.contains_key(CA_CERTIFICATE_KEY));
    let workload = Workload {
        name: &name,
        container: CONTAINER_NAME,
        selector: selector_labels(&instance, &name),
        replicas: consumer.replicas(),
        image: &cx.config.simulator_image,
        image_stream_tag: format!("{}:latest", parent_image_stream(&instance)),
        strategy: "Rolling",
    };
    let labels = workload_labels(consumer, &name);
    reconcile_workload(
        cx,
        workload,
        |object_labels, template| {
            merge_labels(object_labels, &labels);
            configure_pod(consumer, &name, trusts_ca, template);
            Ok(())
        },
        mixins,
    )
    .await
}
