use std::sync::Arc;

use futures::stream::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Secret, Service, ServiceAccount},
    rbac::v1::{Role, RoleBinding},
};
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::{self, Config},
    },
    Api, ResourceExt,
};
use tracing::{debug, error, info};

use crate::{
    install::{mixin::managed, owner::controller_owner, ReconcileResult},
    labels::MANAGED_BY_LABEL_SELECTOR,
    monitoring::prometheus::reconcile_monitoring,
    openshift::{BuildConfig, DeploymentConfig, ImageStream, Route},
    simulator::{
        builds::reconcile_builds, console::reconcile_console, endpoint::reconcile_endpoint,
        Simulator,
    },
    utils::{on_error, Context, Error, ReconcileCounter},
    workload::instance_name,
};

/// Start a controller for the Simulator CRD.
pub async fn run(context: Arc<Context>) {
    let k_client = context.k_client.clone();
    let simulators: Api<Simulator> = Api::all(k_client.clone());
    let owned = watcher::Config::default().labels(MANAGED_BY_LABEL_SELECTOR);

    let controller = Controller::new(simulators, Config::default())
        .owns(Api::<ConfigMap>::all(k_client.clone()), owned.clone())
        .owns(Api::<Secret>::all(k_client.clone()), owned.clone())
        .owns(Api::<Service>::all(k_client.clone()), owned.clone())
        .owns(Api::<ServiceAccount>::all(k_client.clone()), owned.clone())
        .owns(Api::<Role>::all(k_client.clone()), owned.clone())
        .owns(Api::<RoleBinding>::all(k_client.clone()), owned.clone());
    let controller = if context.config.platform.is_openshift() {
        controller
            .owns(Api::<DeploymentConfig>::all(k_client.clone()), owned.clone())
            .owns(Api::<BuildConfig>::all(k_client.clone()), owned.clone())
            .owns(Api::<ImageStream>::all(k_client.clone()), owned.clone())
            .owns(Api::<Route>::all(k_client), owned)
    } else {
        controller.owns(Api::<Deployment>::all(k_client), owned)
    };

    controller
        .run(reconcile, on_error, context)
        .for_each(|rec_res| async move {
            match rec_res {
                Ok((simulator, _)) => {
                    info!(simulator.name, "reconcile success");
                }
                Err(err) => {
                    error!(?err, "reconcile error")
                }
            }
        })
        .await;
}

/// Perform a reconcile pass for the Simulator CRD
async fn reconcile(simulator: Arc<Simulator>, cx: Arc<Context>) -> Result<Action, Error> {
    ReconcileCounter::new("simulator").record(reconcile_(simulator, cx).await)
}

async fn reconcile_(simulator: Arc<Simulator>, cx: Arc<Context>) -> Result<Action, Error> {
    let name = simulator.name_any();
    if !cx.config.accepts(&name) {
        debug!(name, "not the watched simulator, skipping");
        return Ok(Action::await_change());
    }
    debug!(name, spec = ?simulator.spec, "reconcile");

    let ns = simulator
        .namespace()
        .ok_or_else(|| Error::Config("Simulator without namespace".to_owned()))?;
    let install = cx.install(&ns);
    let instance = instance_name(&name);
    let mixins = [controller_owner(simulator.as_ref()), managed()];
    let mut result = ReconcileResult::default();

    reconcile_endpoint(
        &install,
        &name,
        cx.config.endpoint(&simulator),
        &mixins,
        &mut result,
    )
    .await;
    reconcile_console(&install, &name, &instance, &mixins, &mut result).await;
    reconcile_monitoring(&install, &name, &instance, &mixins, &mut result).await;
    if cx.config.platform.is_openshift() {
        reconcile_builds(&install, &simulator, &instance, &mixins, &mut result).await;
    }

    result.into_action()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::ByteString;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        config::{ConfigOptions, OperatorConfig},
        platform::Platform,
        simulator::{BuildSpec, EndpointSpec, GitSpec, SimulatorSpec},
    };

    #[tokio::test]
    #[traced_test]
    async fn kubernetes_objects() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_kubernetes());
        let simulator = Arc::new(Simulator::test());

        reconcile_(simulator.clone(), cx.clone()).await.unwrap();
        expect_test::expect![[r#"
            [
                "POST /api/v1/namespaces/default/configmaps",
                "POST /api/v1/namespaces/default/secrets",
                "POST /apis/apps/v1/namespaces/default/deployments",
                "POST /api/v1/namespaces/default/services",
                "POST /api/v1/namespaces/default/serviceaccounts",
                "POST /apis/rbac.authorization.k8s.io/v1/namespaces/default/roles",
                "POST /apis/rbac.authorization.k8s.io/v1/namespaces/default/rolebindings",
                "POST /apis/monitoring.coreos.com/v1/namespaces/default/prometheuses",
                "POST /api/v1/namespaces/default/services",
                "POST /apis/monitoring.coreos.com/v1/namespaces/default/servicemonitors",
            ]
        "#]]
        .assert_debug_eq(&server.writes_since(0));

        let first = server.write_count();
        reconcile_(simulator, cx).await.unwrap();
        assert!(server.writes_since(first).is_empty());

        let deployment: Deployment = server
            .get("/apis/apps/v1/namespaces/default/deployments/sim1-iot-simulator-console")
            .unwrap();
        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(
            container.image.as_deref(),
            Some("docker.io/ctron/iot-simulator-console:latest")
        );
        let env: Vec<_> = container
            .env
            .iter()
            .flatten()
            .map(|var| (var.name.as_str(), var.value.as_deref()))
            .collect();
        assert_eq!(
            env,
            vec![
                ("PROMETHEUS_HOST", Some("sim1-iot-simulator-prometheus")),
                ("PROMETHEUS_PORT", Some("9090")),
                ("NAMESPACE", None),
            ]
        );

        let secret: Secret = server
            .get("/api/v1/namespaces/default/secrets/sim1")
            .unwrap();
        assert_eq!(
            secret.data.unwrap().get("endpoint.password"),
            Some(&ByteString(b"verysecret".to_vec()))
        );
    }

    #[tokio::test]
    async fn openshift_builds_and_route() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_openshift());
        let mut simulator = Simulator::test();
        simulator.spec.builds.insert(
            "hono-simulator".to_owned(),
            BuildSpec {
                git: GitSpec {
                    uri: Some("https://example.com/fork/hono-simulator".to_owned()),
                    reference: Some("develop".to_owned()),
                },
            },
        );
        let simulator = Arc::new(simulator);

        reconcile_(simulator.clone(), cx.clone()).await.unwrap();
        let first = server.write_count();
        reconcile_(simulator, cx).await.unwrap();
        assert!(server.writes_since(first).is_empty());

        let parent: BuildConfig = server
            .get("/apis/build.openshift.io/v1/namespaces/default/buildconfigs/sim1-iot-simulator-parent")
            .unwrap();
        let git = parent.spec.source.git.unwrap();
        assert_eq!(git.uri, "https://example.com/fork/hono-simulator");
        assert_eq!(git.reference.as_deref(), Some("develop"));
        assert_eq!(
            parent.spec.output.to.unwrap().name.as_deref(),
            Some("sim1-iot-simulator-parent:latest")
        );

        let console: BuildConfig = server
            .get("/apis/build.openshift.io/v1/namespaces/default/buildconfigs/sim1-iot-simulator-console")
            .unwrap();
        let git = console.spec.source.git.unwrap();
        assert_eq!(git.uri, "https://github.com/ctron/iot-simulator-console");
        assert_eq!(git.reference.as_deref(), Some("master"));

        let route: Route = server
            .get("/apis/route.openshift.io/v1/namespaces/default/routes/sim1-iot-simulator-console")
            .unwrap();
        assert_eq!(route.spec.tls.unwrap().termination, "edge");
        assert_eq!(route.spec.to.name, "sim1-iot-simulator-console");

        assert!(server
            .get::<ImageStream>(
                "/apis/image.openshift.io/v1/namespaces/default/imagestreams/sim1-iot-simulator-console"
            )
            .is_some());
        assert!(server
            .get::<Deployment>(
                "/apis/apps/v1/namespaces/default/deployments/sim1-iot-simulator-console"
            )
            .is_none());
    }

    #[tokio::test]
    async fn missing_endpoint_fails_only_settings() {
        let (cx, server) = Context::with_fake_api_server(OperatorConfig::test_kubernetes());
        let mut simulator = Simulator::test();
        simulator.spec = SimulatorSpec::default();

        let err = reconcile_(Arc::new(simulator), cx).await.unwrap_err();
        assert!(matches!(err, Error::Aggregate(ref errors) if errors.len() == 2), "{err}");
        assert!(!server
            .writes_since(0)
            .iter()
            .any(|write| write.contains("configmaps") || write.contains("secrets")));
        assert!(server
            .get::<Deployment>(
                "/apis/apps/v1/namespaces/default/deployments/sim1-iot-simulator-console"
            )
            .is_some());
    }

    #[tokio::test]
    async fn operator_endpoint_is_the_fallback() {
        let options = ConfigOptions {
            simulator_config: Some(serde_json::to_string(&EndpointSpec::test()).unwrap()),
            ..Default::default()
        };
        let config = OperatorConfig::new(Platform::Kubernetes, &options).unwrap();
        let (cx, server) = Context::with_fake_api_server(config);
        let mut simulator = Simulator::test();
        simulator.spec.endpoint = None;

        reconcile_(Arc::new(simulator), cx).await.unwrap();
        let config_map: ConfigMap = server
            .get("/api/v1/namespaces/default/configmaps/sim1")
            .unwrap();
        assert_eq!(
            config_map.data.unwrap().get("endpoint.host").map(String::as_str),
            Some("messaging.hono.svc")
        );
    }

    #[tokio::test]
    async fn other_simulators_are_skipped() {
        let mut config = OperatorConfig::test_kubernetes();
        config.watch_simulator_name = Some("other".to_owned());
        let (cx, server) = Context::with_fake_api_server(config);

        let action = reconcile_(Arc::new(Simulator::test()), cx).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(server.write_count(), 0);
    }
}
