//! Pieces shared by the producer and consumer workloads.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, ContainerPort, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
            ResourceRequirements, Service,
        },
    },
    apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
};
use kube::Resource;

use crate::{
    consumer::SimulatorConsumer,
    install::{
        corev1::{
            reconcile_deployment, reconcile_service, service_port, set_service_ports,
            set_service_selector,
        },
        mixin::managed,
        openshift::{reconcile_deployment_config, reconcile_empty_image_stream},
        owner::{controller_owner, object_owner},
        simple, Applied, InstallContext, MixIn, ReconcileResult,
    },
    labels::{selector_labels, METRICS_LABEL, SIMULATOR_LABEL},
    openshift::{DeploymentConfig, DeploymentTriggerImageChangeParams, DeploymentTriggerPolicy},
    producer::SimulatorProducer,
    utils::Error,
};

/// Message type used when none is given.
pub const DEFAULT_MESSAGE_TYPE: &str = "telemetry";
/// Port serving `/health` and `/metrics` in the simulator images.
pub const METRICS_PORT: i32 = 8081;
/// Name of the metrics port on containers and services.
pub const METRICS_PORT_NAME: &str = "metrics";

/// Command prefix shared by all simulator applications.
const JAVA_OPTIONS: [&str; 2] = [
    "-Dvertx.cacheDirBase=/tmp",
    "-Dvertx.logger-delegate-factory-class-name=io.vertx.core.logging.SLF4JLogDelegateFactory",
];

/// A custom resource deploying a simulator workload.
pub trait SimulatorComponent: Resource<DynamicType = ()> {
    /// Name of the Simulator the component belongs to, may be empty
    fn simulator(&self) -> &str;
    /// Tenant of the simulated devices
    fn tenant(&self) -> &str;
    /// Type of messages, `telemetry` unless set
    fn message_type(&self) -> &str;
    /// Requested number of pods, 1 unless set
    fn replicas(&self) -> i32;
}

impl SimulatorComponent for SimulatorProducer {
    fn simulator(&self) -> &str {
        &self.spec.simulator
    }
    fn tenant(&self) -> &str {
        &self.spec.tenant
    }
    fn message_type(&self) -> &str {
        non_empty_or(self.spec.message_type.as_deref(), DEFAULT_MESSAGE_TYPE)
    }
    fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }
}

impl SimulatorComponent for SimulatorConsumer {
    fn simulator(&self) -> &str {
        &self.spec.simulator
    }
    fn tenant(&self) -> &str {
        &self.spec.tenant
    }
    fn message_type(&self) -> &str {
        non_empty_or(self.spec.message_type.as_deref(), DEFAULT_MESSAGE_TYPE)
    }
    fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }
}

fn non_empty_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.filter(|value| !value.is_empty()).unwrap_or(default)
}

/// Name of the simulator instance, prefix of all objects belonging to it.
pub fn instance_name(simulator: &str) -> String {
    if simulator.is_empty() {
        "iot-simulator".to_owned()
    } else {
        format!("{simulator}-iot-simulator")
    }
}

/// Name of the ConfigMap and Secret holding the endpoint settings of a simulator.
pub fn settings_name(simulator: &str) -> String {
    if simulator.is_empty() {
        instance_name(simulator)
    } else {
        simulator.to_owned()
    }
}

/// Name of the workload and service of a component, e.g. `dc-prod-<name>`.
pub fn workload_name(prefix: &str, name: &str) -> String {
    format!("dc-{prefix}-{name}")
}

/// Image stream tag OpenShift deploys the simulator workloads from.
pub fn parent_image_stream(instance: &str) -> String {
    format!("{instance}-parent")
}

/// `java` command line running one of the simulator applications.
pub fn java_command(extra_options: &[&str], jar: &str) -> Vec<String> {
    std::iter::once("java")
        .chain(extra_options.iter().copied())
        .chain(JAVA_OPTIONS)
        .chain(["-jar", jar])
        .map(str::to_owned)
        .collect()
}

/// Point a probe at the `/health` endpoint of the metrics port.
///
/// Timing settings of an existing probe are kept.
pub fn apply_probe(probe: &mut Option<Probe>) {
    let probe = probe.get_or_insert_with(Probe::default);
    probe.exec = None;
    probe.tcp_socket = None;
    probe.grpc = None;
    probe.http_get = Some(HTTPGetAction {
        path: Some("/health".to_owned()),
        port: IntOrString::Int(METRICS_PORT),
        scheme: Some("HTTP".to_owned()),
        ..Default::default()
    });
}

/// The metrics container port.
pub fn metrics_container_port() -> ContainerPort {
    ContainerPort {
        container_port: METRICS_PORT,
        name: Some(METRICS_PORT_NAME.to_owned()),
        protocol: Some("TCP".to_owned()),
        ..Default::default()
    }
}

/// Limit the memory of a container, other resource settings are kept.
pub fn set_memory_limit(container: &mut Container, limit: &str) {
    container
        .resources
        .get_or_insert_with(ResourceRequirements::default)
        .limits
        .get_or_insert_with(BTreeMap::new)
        .insert("memory".to_owned(), Quantity(limit.to_owned()));
}

/// Make sure the pod runs exactly one container with the given name and return it.
pub fn single_container<'a>(template: &'a mut PodTemplateSpec, name: &str) -> &'a mut Container {
    let pod = template.spec.get_or_insert_with(PodSpec::default);
    if pod.containers.len() != 1 {
        pod.containers = vec![Container::default()];
    }
    let container = &mut pod.containers[0];
    container.name = name.to_owned();
    container
}

/// Merge labels into a label map.
pub fn merge_labels(target: &mut Option<BTreeMap<String, String>>, labels: &BTreeMap<String, String>) {
    target
        .get_or_insert_with(BTreeMap::new)
        .extend(labels.clone());
}

/// Deploy on config changes and whenever the parent image stream gets a new image.
pub fn set_image_change_triggers(config: &mut DeploymentConfig, container: &str, tag: &str) {
    let triggers = &mut config.spec.triggers;
    if triggers.len() != 2 {
        *triggers = vec![
            DeploymentTriggerPolicy::default(),
            DeploymentTriggerPolicy::default(),
        ];
    }
    triggers[0].type_ = "ConfigChange".to_owned();
    triggers[0].image_change_params = None;
    triggers[1].type_ = "ImageChange".to_owned();
    let params = triggers[1]
        .image_change_params
        .get_or_insert_with(DeploymentTriggerImageChangeParams::default);
    params.automatic = true;
    params.container_names = vec![container.to_owned()];
    params.from.kind = Some("ImageStreamTag".to_owned());
    params.from.name = Some(tag.to_owned());
}

/// Platform independent description of a workload.
pub struct Workload<'a> {
    /// Name of the Deployment or DeploymentConfig
    pub name: &'a str,
    /// Name of the single container
    pub container: &'a str,
    /// Labels selecting the pods
    pub selector: BTreeMap<String, String>,
    /// Number of pods
    pub replicas: i32,
    /// Image used on Kubernetes, OpenShift deploys from an image stream tag
    pub image: &'a str,
    /// Image stream tag used on OpenShift
    pub image_stream_tag: String,
    /// DeploymentConfig strategy, `Recreate` or `Rolling`
    pub strategy: &'a str,
}

/// Create or update the Deployment (Kubernetes) or DeploymentConfig (OpenShift) of a workload.
///
/// `configure` receives the labels of the workload object and its pod template.
pub async fn reconcile_workload<F>(
    cx: &InstallContext<'_>,
    workload: Workload<'_>,
    configure: F,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    F: FnOnce(&mut Option<BTreeMap<String, String>>, &mut PodTemplateSpec) -> Result<(), Error>
        + Send,
{
    let Workload {
        name,
        container,
        selector,
        replicas,
        image,
        image_stream_tag,
        strategy,
    } = workload;

    if cx.config.platform.is_openshift() {
        reconcile_deployment_config(
            cx,
            name,
            simple(move |config: &mut DeploymentConfig| {
                let template = config.spec.template.get_or_insert_with(Default::default);
                configure(&mut config.metadata.labels, template)?;
                config.spec.replicas = replicas;
                config.spec.selector = selector;
                config.spec.strategy.type_ = Some(strategy.to_owned());
                set_image_change_triggers(config, container, &image_stream_tag);
                Ok(())
            }),
            mixins,
        )
        .await
    } else {
        reconcile_deployment(
            cx,
            name,
            simple(move |deployment: &mut Deployment| {
                let spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
                configure(&mut deployment.metadata.labels, &mut spec.template)?;
                spec.replicas = Some(replicas);
                spec.selector.match_labels = Some(selector);
                single_container(&mut spec.template, container).image = Some(image.to_owned());
                Ok(())
            }),
            mixins,
        )
        .await
    }
}

/// Create or update the service exposing the metrics port of a workload to prometheus.
pub async fn reconcile_metrics_service(
    cx: &InstallContext<'_>,
    name: &str,
    instance: &str,
    simulator: &str,
    mixins: &[MixIn],
) -> Result<Applied, Error> {
    let selector = selector_labels(instance, name);
    reconcile_service(
        cx,
        name,
        simple(|service: &mut Service| {
            set_service_selector(service, &selector);
            let labels = service.metadata.labels.get_or_insert_with(BTreeMap::new);
            labels.insert(METRICS_LABEL.to_owned(), instance.to_owned());
            labels.insert(SIMULATOR_LABEL.to_owned(), simulator.to_owned());
            set_service_ports(service, vec![service_port(METRICS_PORT_NAME, METRICS_PORT)]);
            Ok(())
        }),
        mixins,
    )
    .await
}

/// Reconcile everything a producer or consumer owns besides its workload.
///
/// The metrics service is controlled by the component. On OpenShift the component also holds a
/// non-controlling reference on the parent image stream shared by all workloads of its simulator.
pub async fn reconcile_component_objects<K>(
    cx: &InstallContext<'_>,
    component: &K,
    workload: &str,
    result: &mut ReconcileResult,
) where
    K: SimulatorComponent,
{
    let instance = instance_name(component.simulator());
    let mixins = [controller_owner(component), managed()];
    result.process(
        reconcile_metrics_service(cx, workload, &instance, component.simulator(), &mixins).await,
    );

    if cx.config.platform.is_openshift() {
        let mixins = [object_owner(component), managed()];
        result.process(
            reconcile_empty_image_stream(cx, &parent_image_stream(&instance), &mixins).await,
        );
    }
}
