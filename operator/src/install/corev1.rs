//! Entry points and opinionated helpers for core and apps kinds.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Secret, Service, ServiceAccount, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::core::ObjectMeta;

use super::{reconcile_object, simple, Applied, InstallContext, MixIn, Outcome};
use crate::utils::Error;

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        ..Default::default()
    }
}

/// Create or update a ConfigMap.
pub async fn reconcile_config_map<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut ConfigMap) -> Result<Outcome, Error> + Send,
{
    let template = ConfigMap {
        metadata: meta(name),
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a Secret.
pub async fn reconcile_secret<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Secret) -> Result<Outcome, Error> + Send,
{
    let template = Secret {
        metadata: meta(name),
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a Service.
pub async fn reconcile_service<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Service) -> Result<Outcome, Error> + Send,
{
    let template = Service {
        metadata: meta(name),
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a ServiceAccount.
pub async fn reconcile_service_account<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut ServiceAccount) -> Result<Outcome, Error> + Send,
{
    let template = ServiceAccount {
        metadata: meta(name),
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create a ServiceAccount, an existing one is only decorated by the mix-ins.
pub async fn reconcile_plain_service_account(
    cx: &InstallContext<'_>,
    name: &str,
    mixins: &[MixIn],
) -> Result<Applied, Error> {
    reconcile_service_account(cx, name, simple(|_: &mut ServiceAccount| Ok(())), mixins).await
}

/// Create or update a Deployment.
pub async fn reconcile_deployment<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Deployment) -> Result<Outcome, Error> + Send,
{
    let template = Deployment {
        metadata: meta(name),
        ..Default::default()
    };
    reconcile_object(cx, template, mutator, mixins).await
}

/// Label the service and select pods carrying the same labels.
///
/// Ports are left to the caller.
pub fn set_service_selector(service: &mut Service, labels: &BTreeMap<String, String>) {
    service
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(labels.clone());
    service.spec.get_or_insert_with(ServiceSpec::default).selector = Some(labels.clone());
}

/// A TCP service port forwarding to the same container port.
pub fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_owned()),
        port,
        target_port: Some(IntOrString::Int(port)),
        protocol: Some("TCP".to_owned()),
        ..Default::default()
    }
}

/// Replace the ports of a service, keeping server assigned node ports for ports that survive.
pub fn set_service_ports(service: &mut Service, ports: Vec<ServicePort>) {
    let spec = service.spec.get_or_insert_with(ServiceSpec::default);
    let existing = spec.ports.take().unwrap_or_default();
    let ports = ports
        .into_iter()
        .map(|mut port| {
            port.node_port = existing
                .iter()
                .find(|current| current.name == port.name && current.port == port.port)
                .and_then(|current| current.node_port);
            port
        })
        .collect();
    spec.ports = Some(ports);
}
