use std::{fmt::Debug, sync::Arc};

use futures::stream::StreamExt;
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, PodTemplateSpec, Secret},
    },
    NamespaceResourceScope,
};
use kube::{
    api::{ListParams, Patch, PatchParams},
    runtime::{
        controller::{Action, Controller},
        reflector::ObjectRef,
        watcher,
    },
    Api, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    install::InstallContext,
    labels::{label_selector, MANAGED_BY_LABEL_SELECTOR, SETTINGS_LABEL},
    openshift::DeploymentConfig,
    settings::{settings_digest, SETTINGS_DIGEST_ANNOTATION},
    utils::{on_error, Context, Error, ReconcileCounter},
    CONTROLLER_NAME,
};

/// Start a controller propagating changes of the settings ConfigMaps and Secrets.
pub async fn run(context: Arc<Context>) {
    let k_client = context.k_client.clone();
    let config_maps: Api<ConfigMap> = Api::all(k_client.clone());
    let managed = watcher::Config::default().labels(MANAGED_BY_LABEL_SELECTOR);

    Controller::new(config_maps, managed.clone())
        .watches(Api::<Secret>::all(k_client), managed, |secret| {
            let ns = secret.namespace()?;
            Some(ObjectRef::new(&secret.name_any()).within(&ns))
        })
        .run(reconcile, on_error, context)
        .for_each(|rec_res| async move {
            match rec_res {
                Ok((config_map, _)) => {
                    debug!(config_map.name, "reconcile success");
                }
                Err(err) => {
                    error!(?err, "reconcile error")
                }
            }
        })
        .await;
}

async fn reconcile(config_map: Arc<ConfigMap>, cx: Arc<Context>) -> Result<Action, Error> {
    ReconcileCounter::new("settings").record(reconcile_(config_map, cx).await)
}

async fn reconcile_(config_map: Arc<ConfigMap>, cx: Arc<Context>) -> Result<Action, Error> {
    let name = config_map.name_any();
    let ns = config_map
        .namespace()
        .ok_or_else(|| Error::Config("ConfigMap without namespace".to_owned()))?;
    let install = cx.install(&ns);

    let secrets: Api<Secret> = Api::namespaced(cx.k_client.clone(), &ns);
    let secret = secrets.get_opt(&name).await?;
    let digest = settings_digest(&config_map, secret.as_ref());
    debug!(name, digest, secret = secret.is_some(), "settings digest");

    let patched = if cx.config.platform.is_openshift() {
        stamp_workloads::<DeploymentConfig>(&install, &name, &digest).await?
    } else {
        stamp_workloads::<Deployment>(&install, &name, &digest).await?
    };
    if patched > 0 {
        info!(name, patched, "settings changed, rolling workloads");
    }

    Ok(Action::await_change())
}

/// Workload kinds carrying a pod template.
trait PodTemplateOwner {
    fn pod_template(&self) -> Option<&PodTemplateSpec>;
}

impl PodTemplateOwner for Deployment {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|spec| &spec.template)
    }
}

impl PodTemplateOwner for DeploymentConfig {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.template.as_ref()
    }
}

fn current_digest(workload: &impl PodTemplateOwner) -> Option<&str> {
    workload
        .pod_template()?
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(SETTINGS_DIGEST_ANNOTATION)
        .map(String::as_str)
}

/// Merge patch the digest into every workload using the settings, returns the number patched.
async fn stamp_workloads<K>(
    cx: &InstallContext<'_>,
    settings: &str,
    digest: &str,
) -> Result<usize, Error>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + PodTemplateOwner
        + Clone
        + Debug
        + DeserializeOwned,
{
    let api: Api<K> = Api::namespaced(cx.client.clone(), cx.namespace);
    let workloads = api
        .list(&ListParams::default().labels(&label_selector(SETTINGS_LABEL, settings)))
        .await?;

    let patch = json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { SETTINGS_DIGEST_ANNOTATION: digest }
                }
            }
        }
    });
    let params = PatchParams {
        field_manager: Some(CONTROLLER_NAME.to_owned()),
        ..Default::default()
    };

    let mut patched = 0;
    for workload in workloads {
        if current_digest(&workload) == Some(digest) {
            continue;
        }
        let name = workload.name_any();
        api.patch(&name, &params, &Patch::Merge(&patch)).await?;
        debug!(kind = %K::kind(&()), name, "settings digest stamped");
        patched += 1;
    }
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{api::apps::v1::DeploymentSpec, ByteString};
    use kube::core::ObjectMeta;
    use tracing_test::traced_test;

    use super::*;
    use crate::{config::OperatorConfig, openshift::DeploymentConfigSpec};

    const SECRET_PATH: &str = "/api/v1/namespaces/default/secrets/sim1";
    const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/default/deployments";

    fn settings_meta(name: &str, settings: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some("default".to_owned()),
            labels: Some(BTreeMap::from_iter([(
                SETTINGS_LABEL.to_owned(),
                settings.to_owned(),
            )])),
            ..Default::default()
        }
    }

    fn config_map(host: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("sim1".to_owned()),
                namespace: Some("default".to_owned()),
                ..Default::default()
            },
            data: Some(BTreeMap::from_iter([(
                "endpoint.host".to_owned(),
                host.to_owned(),
            )])),
            ..Default::default()
        }
    }

    fn deployment(name: &str, settings: &str) -> Deployment {
        Deployment {
            metadata: settings_meta(name, settings),
            spec: Some(DeploymentSpec::default()),
            ..Default::default()
        }
    }

    fn annotation(template: Option<PodTemplateSpec>) -> Option<String> {
        template?
            .metadata?
            .annotations?
            .remove(SETTINGS_DIGEST_ANNOTATION)
    }

    fn deployment_digest(server: &crate::utils::test::FakeApiServer, name: &str) -> Option<String> {
        let deployment: Deployment = server.get(&format!("{DEPLOYMENTS}/{name}"))?;
        annotation(deployment.spec.map(|spec| spec.template))
    }

    #[tokio::test]
    #[traced_test]
    async fn stamps_only_matching_workloads() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_kubernetes());
        server.insert(
            &format!("{DEPLOYMENTS}/dc-prod-producer1"),
            deployment("dc-prod-producer1", "sim1"),
        );
        server.insert(
            &format!("{DEPLOYMENTS}/dc-prod-producer2"),
            deployment("dc-prod-producer2", "sim2"),
        );
        server.insert(
            SECRET_PATH,
            Secret {
                metadata: settings_meta("sim1", "sim1"),
                data: Some(BTreeMap::from_iter([(
                    "endpoint.password".to_owned(),
                    ByteString(b"verysecret".to_vec()),
                )])),
                ..Default::default()
            },
        );

        let config_map = Arc::new(config_map("messaging.hono.svc"));
        reconcile_(config_map.clone(), cx.clone()).await.unwrap();
        expect_test::expect![[r#"
            [
                "PATCH /apis/apps/v1/namespaces/default/deployments/dc-prod-producer1",
            ]
        "#]]
        .assert_debug_eq(&server.writes_since(0));

        let secret: Secret = server.get(SECRET_PATH).unwrap();
        assert_eq!(
            deployment_digest(&server, "dc-prod-producer1"),
            Some(settings_digest(&config_map, Some(&secret)))
        );
        assert_eq!(deployment_digest(&server, "dc-prod-producer2"), None);

        let first = server.write_count();
        reconcile_(config_map, cx).await.unwrap();
        assert!(server.writes_since(first).is_empty());
    }

    #[tokio::test]
    async fn changed_settings_roll_again() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_kubernetes());
        server.insert(
            &format!("{DEPLOYMENTS}/dc-con-consumer1"),
            deployment("dc-con-consumer1", "sim1"),
        );

        reconcile_(Arc::new(config_map("a.hono.svc")), cx.clone())
            .await
            .unwrap();
        let before = deployment_digest(&server, "dc-con-consumer1");

        reconcile_(Arc::new(config_map("b.hono.svc")), cx)
            .await
            .unwrap();
        let after = deployment_digest(&server, "dc-con-consumer1");

        assert_eq!(server.write_count(), 2);
        assert!(before.is_some());
        assert_ne!(before, after);
        assert_eq!(
            after,
            Some(settings_digest(&config_map("b.hono.svc"), None))
        );
    }

    #[tokio::test]
    async fn openshift_stamps_deployment_configs() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_openshift());
        let path = "/apis/apps.openshift.io/v1/namespaces/default/deploymentconfigs/dc-prod-producer1";
        let mut dc = DeploymentConfig::new("dc-prod-producer1", DeploymentConfigSpec::default());
        dc.metadata = settings_meta("dc-prod-producer1", "sim1");
        server.insert(path, dc);
        server.insert(
            &format!("{DEPLOYMENTS}/dc-prod-producer1"),
            deployment("dc-prod-producer1", "sim1"),
        );

        reconcile_(Arc::new(config_map("messaging.hono.svc")), cx)
            .await
            .unwrap();
        let dc: DeploymentConfig = server.get(path).unwrap();
        assert!(annotation(dc.spec.template).is_some());
        assert_eq!(deployment_digest(&server, "dc-prod-producer1"), None);
    }
}
