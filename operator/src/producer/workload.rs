use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, PodTemplateSpec};

use crate::{
    install::{env, Applied, InstallContext, MixIn},
    labels::{
        selector_labels, APP_ROLE_LABEL, MESSAGE_TYPE_LABEL, PROTOCOL_LABEL, SETTINGS_LABEL,
        SIMULATOR_LABEL, TENANT_LABEL,
    },
    producer::{Protocol, SimulatorProducer},
    utils::Error,
    workload::{
        apply_probe, instance_name, java_command, merge_labels, metrics_container_port,
        parent_image_stream, reconcile_workload, set_memory_limit, settings_name,
        single_container, workload_name, SimulatorComponent, Workload,
    },
};

pub const CONTAINER_NAME: &str = "producer";
const WORKLOAD_PREFIX: &str = "prod";
const MEMORY_LIMIT: &str = "1Gi";

/// Name of the Deployment or DeploymentConfig and the metrics Service of a producer.
pub fn producer_workload_name(producer: &SimulatorProducer) -> String {
    workload_name(
        WORKLOAD_PREFIX,
        producer.metadata.name.as_deref().unwrap_or_default(),
    )
}

fn protocol(producer: &SimulatorProducer) -> Protocol {
    producer.spec.protocol.unwrap_or_default()
}

/// Labels of the workload object.
fn workload_labels(producer: &SimulatorProducer, workload: &str) -> BTreeMap<String, String> {
    let mut labels = pod_labels(producer, workload);
    labels.insert(APP_ROLE_LABEL.to_owned(), CONTAINER_NAME.to_owned());
    labels.insert(
        PROTOCOL_LABEL.to_owned(),
        protocol(producer).as_str().to_owned(),
    );
    labels
}

/// Labels of the pod template, the env of the container reads some of them back.
fn pod_labels(producer: &SimulatorProducer, workload: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(&instance_name(producer.simulator()), workload);
    labels.extend([
        (TENANT_LABEL.to_owned(), producer.tenant().to_owned()),
        (SIMULATOR_LABEL.to_owned(), producer.simulator().to_owned()),
        (
            MESSAGE_TYPE_LABEL.to_owned(),
            producer.message_type().to_owned(),
        ),
        (
            SETTINGS_LABEL.to_owned(),
            settings_name(producer.simulator()),
        ),
    ]);
    labels
}

fn producer_env(producer: &SimulatorProducer) -> Vec<EnvVar> {
    let settings = settings_name(producer.simulator());
    let mut vars = vec![
        env::from_label("MESSAGE_TYPE", MESSAGE_TYPE_LABEL),
        env::value("PERIOD_MS", "1000"),
        env::value("NUM_DEVICES", producer.spec.number_of_devices.to_string()),
        env::from_label("HONO_TENANT", TENANT_LABEL),
        env::from_config_map("DEVICE_REGISTRY_URL", &settings, "deviceRegistry.url"),
    ];
    if let Some(threads) = producer.spec.number_of_threads {
        vars.push(env::value("NUM_THREADS", threads.to_string()));
    }
    match protocol(producer) {
        Protocol::Http => vars.extend([
            env::from_config_map("HONO_HTTP_URL", &settings, "httpAdapter.url"),
            env::value("DEVICE_PROVIDER", "VERTX"),
            env::value("VERTX_POOLED_BUFFERS", "true"),
            env::value("VERTX_RECREATE_CLIENT", "120000"),
            env::value("VERTX_KEEP_ALIVE", "true"),
        ]),
        Protocol::Mqtt => vars.extend([
            env::from_config_map("HONO_MQTT_HOST", &settings, "mqttAdapter.host"),
            env::from_config_map("HONO_MQTT_PORT", &settings, "mqttAdapter.port"),
        ]),
    }
    vars
}

fn producer_command(protocol: Protocol) -> Vec<String> {
    let jar = match protocol {
        Protocol::Http => "/build/simulator-http/target/simulator-http-app.jar",
        Protocol::Mqtt => "/build/simulator-mqtt/target/simulator-mqtt-app.jar",
    };
    java_command(&[], jar)
}

/// Bring the pod template of a producer into shape.
///
/// Command and env are replaced as a whole so switching the protocol leaves nothing behind.
pub fn configure_pod(producer: &SimulatorProducer, workload: &str, template: &mut PodTemplateSpec) {
    merge_labels(
        &mut template.metadata.get_or_insert_with(Default::default).labels,
        &pod_labels(producer, workload),
    );

    let container = single_container(template, CONTAINER_NAME);
    container.command = Some(producer_command(protocol(producer)));
    container.env = Some(producer_env(producer));
    container.ports = Some(vec![metrics_container_port()]);
    apply_probe(&mut container.liveness_probe);
    apply_probe(&mut container.readiness_probe);
    set_memory_limit(container, MEMORY_LIMIT);
}

/// Create or update the Deployment or DeploymentConfig of a producer.
pub async fn reconcile_producer_workload(
    cx: &InstallContext<'_>,
    producer: &SimulatorProducer,
    mixins: &[MixIn],
) -> Result<Applied, Error> {
    let name = producer_workload_name(producer);
    let instance = instance_name(producer.simulator());
    let workload = Workload {
        name: &name,
        container: CONTAINER_NAME,
        selector: selector_labels(&instance, &name),
        replicas: producer.replicas(),
        image: &cx.config.simulator_image,
        image_stream_tag: format!("{}:latest", parent_image_stream(&instance)),
        strategy: "Recreate",
    };
    let labels = workload_labels(producer, &name);
    reconcile_workload(
        cx,
        workload,
        |object_labels, template| {
            merge_labels(object_labels, &labels);
            configure_pod(producer, &name, template);
            Ok(())
        },
        mixins,
    )
    .await
}
