use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        core::v1::Service,
        rbac::v1::{Role, RoleBinding},
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::core::ObjectMeta;

use crate::{
    install::{
        corev1::{
            reconcile_plain_service_account, reconcile_service, service_port, set_service_ports,
        },
        reconcile_object,
        rbac::{bind_service_account, core_rule, reconcile_role, reconcile_role_binding, set_rules},
        simple, Applied, InstallContext, MixIn, Outcome, ReconcileResult,
    },
    labels::{METRICS_LABEL, SIMULATOR_LABEL},
    monitoring::{Endpoint, Prometheus, PrometheusSpec, ServiceMonitor, ServiceMonitorSpec},
    utils::Error,
    workload::METRICS_PORT_NAME,
};

/// Port of the prometheus web interface and API.
pub const PROMETHEUS_PORT: i32 = 9090;
/// Label the prometheus operator puts on the pods of a Prometheus.
const PROMETHEUS_POD_LABEL: &str = "prometheus";

/// Create or update a Prometheus.
pub async fn reconcile_prometheus<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Prometheus) -> Result<Outcome, Error> + Send,
{
    let template = Prometheus::new(name, PrometheusSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a ServiceMonitor.
pub async fn reconcile_service_monitor<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut ServiceMonitor) -> Result<Outcome, Error> + Send,
{
    let template = ServiceMonitor::new(name, ServiceMonitorSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

/// Name of the service account, role, role binding and service of the prometheus instance.
pub fn prometheus_name(instance: &str) -> String {
    format!("{instance}-prometheus")
}

fn match_labels(key: &str, value: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from_iter([(key.to_owned(), value.to_owned())])),
        ..Default::default()
    }
}

/// Reconcile the prometheus stack scraping all workloads of a simulator.
pub async fn reconcile_monitoring(
    cx: &InstallContext<'_>,
    simulator: &str,
    instance: &str,
    mixins: &[MixIn],
    result: &mut ReconcileResult,
) {
    let name = prometheus_name(instance);

    result.process(reconcile_plain_service_account(cx, &name, mixins).await);

    result.process(
        reconcile_role(
            cx,
            &name,
            simple(|role: &mut Role| {
                set_rules(
                    role,
                    vec![core_rule(
                        &["services", "endpoints", "pods"],
                        &["get", "list", "watch"],
                    )],
                );
                Ok(())
            }),
            mixins,
        )
        .await,
    );

    result.process(
        reconcile_role_binding(
            cx,
            &name,
            simple(|binding: &mut RoleBinding| {
                bind_service_account(binding, &name, &name, cx.namespace);
                Ok(())
            }),
            mixins,
        )
        .await,
    );

    result.process(
        reconcile_prometheus(
            cx,
            instance,
            simple(|prometheus: &mut Prometheus| {
                prometheus.spec.service_account_name = Some(name.clone());
                prometheus.spec.service_monitor_selector =
                    Some(match_labels(SIMULATOR_LABEL, simulator));
                Ok(())
            }),
            mixins,
        )
        .await,
    );

    result.process(
        reconcile_service(
            cx,
            &name,
            simple(|service: &mut Service| {
                let spec = service.spec.get_or_insert_with(Default::default);
                spec.selector = Some(BTreeMap::from_iter([(
                    PROMETHEUS_POD_LABEL.to_owned(),
                    instance.to_owned(),
                )]));
                set_service_ports(service, vec![service_port("web", PROMETHEUS_PORT)]);
                Ok(())
            }),
            mixins,
        )
        .await,
    );

    result.process(
        reconcile_service_monitor(
            cx,
            instance,
            simple(|monitor: &mut ServiceMonitor| {
                set_labels(&mut monitor.metadata, SIMULATOR_LABEL, simulator);
                monitor.spec.selector = match_labels(METRICS_LABEL, instance);
                monitor.spec.endpoints = vec![Endpoint {
                    port: Some(METRICS_PORT_NAME.to_owned()),
                    ..Default::default()
                }];
                Ok(())
            }),
            mixins,
        )
        .await,
    );
}

fn set_labels(meta: &mut ObjectMeta, key: &str, value: &str) {
    meta.labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_owned(), value.to_owned());
}
