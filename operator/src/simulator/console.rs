//! Web console showing the metrics collected by the simulator's prometheus.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{ContainerPort, PodTemplateSpec, Service},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::{
    install::{
        corev1::{reconcile_service, service_port, set_service_ports, set_service_selector},
        env,
        openshift::{reconcile_route, set_route_target, TlsTermination},
        simple, InstallContext, MixIn, ReconcileResult,
    },
    labels::{selector_labels, APP_ROLE_LABEL, SIMULATOR_LABEL},
    monitoring::prometheus::{prometheus_name, PROMETHEUS_PORT},
    openshift::Route,
    utils::Error,
    workload::{merge_labels, reconcile_workload, single_container, Workload},
};

const CONTAINER_NAME: &str = "console";
const HTTP_PORT: i32 = 8080;
const HTTP_PORT_NAME: &str = "http";

/// Name of the console workload, service and route.
pub fn console_name(instance: &str) -> String {
    format!("{instance}-console")
}

fn configure_pod(
    instance: &str,
    labels: &BTreeMap<String, String>,
    template: &mut PodTemplateSpec,
) -> Result<(), Error> {
    merge_labels(
        &mut template.metadata.get_or_insert_with(Default::default).labels,
        labels,
    );
    let container = single_container(template, CONTAINER_NAME);
    container.env = Some(vec![
        env::value("PROMETHEUS_HOST", prometheus_name(instance)),
        env::value("PROMETHEUS_PORT", PROMETHEUS_PORT.to_string()),
        env::namespace("NAMESPACE"),
    ]);
    container.ports = Some(vec![ContainerPort {
        container_port: HTTP_PORT,
        name: Some(HTTP_PORT_NAME.to_owned()),
        protocol: Some("TCP".to_owned()),
        ..Default::default()
    }]);
    Ok(())
}

/// Reconcile the console workload, its service and on OpenShift an edge terminated route.
pub async fn reconcile_console(
    cx: &InstallContext<'_>,
    simulator: &str,
    instance: &str,
    mixins: &[MixIn],
    result: &mut ReconcileResult,
) {
    let name = console_name(instance);
    let selector = selector_labels(instance, &name);
    let mut labels = selector.clone();
    labels.insert(SIMULATOR_LABEL.to_owned(), simulator.to_owned());
    labels.insert(APP_ROLE_LABEL.to_owned(), CONTAINER_NAME.to_owned());

    let workload = Workload {
        name: &name,
        container: CONTAINER_NAME,
        selector: selector.clone(),
        replicas: 1,
        image: &cx.config.console_image,
        image_stream_tag: format!("{name}:latest"),
        strategy: "Rolling",
    };
    result.process(
        reconcile_workload(
            cx,
            workload,
            |object_labels, template| {
                merge_labels(object_labels, &labels);
                configure_pod(instance, &labels, template)
            },
            mixins,
        )
        .await,
    );

    result.process(
        reconcile_service(
            cx,
            &name,
            simple(|service: &mut Service| {
                set_service_selector(service, &selector);
                set_service_ports(service, vec![service_port(HTTP_PORT_NAME, HTTP_PORT)]);
                Ok(())
            }),
            mixins,
        )
        .await,
    );

    if cx.config.platform.is_openshift() {
        result.process(
            reconcile_route(
                cx,
                &name,
                simple(|route: &mut Route| {
                    set_route_target(
                        route,
                        &name,
                        IntOrString::String(HTTP_PORT_NAME.to_owned()),
                        Some(TlsTermination::Edge),
                    );
                    Ok(())
                }),
                mixins,
            )
            .await,
        );
    }
}
