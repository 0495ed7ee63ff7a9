//! Entry points and opinionated helpers for the OpenShift kinds.
use k8s_openapi::{
    api::core::v1::ObjectReference, apimachinery::pkg::util::intstr::IntOrString,
};

use super::{reconcile_object, Applied, InstallContext, MixIn, Outcome};
use crate::{
    openshift::{
        BuildConfig, BuildConfigSpec, BuildTriggerPolicy, DeploymentConfig, DeploymentConfigSpec,
        DockerBuildStrategy, GitBuildSource, ImageStream, ImageStreamSpec, Route, RoutePort,
        RouteSpec, TlsConfig,
    },
    utils::Error,
};

/// Create or update a DeploymentConfig.
pub async fn reconcile_deployment_config<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut DeploymentConfig) -> Result<Outcome, Error> + Send,
{
    let template = DeploymentConfig::new(name, DeploymentConfigSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update a BuildConfig.
pub async fn reconcile_build_config<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut BuildConfig) -> Result<Outcome, Error> + Send,
{
    let template = BuildConfig::new(name, BuildConfigSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create or update an ImageStream.
pub async fn reconcile_image_stream<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut ImageStream) -> Result<Outcome, Error> + Send,
{
    let template = ImageStream::new(name, ImageStreamSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

/// Create an ImageStream without tags, an existing one is only decorated by the mix-ins.
///
/// Used for streams that are filled by builds.
pub async fn reconcile_empty_image_stream(
    cx: &InstallContext<'_>,
    name: &str,
    mixins: &[MixIn],
) -> Result<Applied, Error> {
    reconcile_image_stream(cx, name, |_| Ok(Outcome::default()), mixins).await
}

/// Create or update a Route.
pub async fn reconcile_route<M>(
    cx: &InstallContext<'_>,
    name: &str,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    M: FnOnce(&mut Route) -> Result<Outcome, Error> + Send,
{
    let template = Route::new(name, RouteSpec::default());
    reconcile_object(cx, template, mutator, mixins).await
}

fn image_stream_tag(reference: &mut ObjectReference, tag: &str) {
    reference.kind = Some("ImageStreamTag".to_owned());
    reference.name = Some(tag.to_owned());
}

/// Build from the given git repository.
pub fn set_git_source(config: &mut BuildConfig, uri: &str, reference: &str) {
    let source = &mut config.spec.source;
    source.type_ = Some("Git".to_owned());
    let git = source.git.get_or_insert_with(GitBuildSource::default);
    git.uri = uri.to_owned();
    git.reference = Some(reference.to_owned());
}

/// Use the docker strategy, optionally replacing the `FROM` image with an image stream tag.
pub fn set_docker_strategy(config: &mut BuildConfig, from: Option<&str>) {
    let strategy = &mut config.spec.strategy;
    strategy.type_ = Some("Docker".to_owned());
    let docker = strategy
        .docker_strategy
        .get_or_insert_with(DockerBuildStrategy::default);
    match from {
        Some(tag) => image_stream_tag(docker.from.get_or_insert_with(Default::default), tag),
        None => docker.from = None,
    }
}

/// Push the build result to an image stream tag.
pub fn set_output_image_stream(config: &mut BuildConfig, tag: &str) {
    image_stream_tag(
        config.spec.output.to.get_or_insert_with(Default::default),
        tag,
    );
}

/// Rebuild on config changes, and on changes of the base image if it comes from an image stream.
///
/// Existing triggers are kept, missing ones are appended.
pub fn enable_default_triggers(config: &mut BuildConfig) {
    let from_stream = config
        .spec
        .strategy
        .docker_strategy
        .as_ref()
        .is_some_and(|docker| docker.from.is_some());
    let kinds: &[&str] = if from_stream {
        &["ConfigChange", "ImageChange"]
    } else {
        &["ConfigChange"]
    };
    let triggers = &mut config.spec.triggers;
    for &kind in kinds {
        if !triggers.iter().any(|trigger| trigger.type_ == kind) {
            triggers.push(BuildTriggerPolicy {
                type_: kind.to_owned(),
                image_change: (kind == "ImageChange").then(Default::default),
            });
        }
    }
}

/// TLS termination of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsTermination {
    /// Terminated at the router, plain HTTP to the service
    Edge,
    /// Terminated at the router and re-encrypted towards the service
    Reencrypt,
    /// Passed through to the service
    Passthrough,
}

/// Route traffic to a service port, optionally with TLS.
pub fn set_route_target(
    route: &mut Route,
    service: &str,
    target_port: IntOrString,
    tls: Option<TlsTermination>,
) {
    let spec = &mut route.spec;
    spec.port = Some(RoutePort { target_port });
    spec.to.kind = "Service".to_owned();
    spec.to.name = service.to_owned();

    match tls {
        Some(termination) => {
            let config = spec.tls.get_or_insert_with(TlsConfig::default);
            match termination {
                TlsTermination::Edge => {
                    config.termination = "edge".to_owned();
                    config.insecure_edge_termination_policy = None;
                }
                TlsTermination::Reencrypt => {
                    config.termination = "reencrypt".to_owned();
                    config.insecure_edge_termination_policy = Some("Redirect".to_owned());
                }
                TlsTermination::Passthrough => {
                    config.termination = "passthrough".to_owned();
                    config.insecure_edge_termination_policy = None;
                }
            }
        }
        None => spec.tls = None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_triggers_are_added_once() {
        let mut config = BuildConfig::new("b", BuildConfigSpec::default());
        set_docker_strategy(&mut config, Some("base:latest"));
        config.spec.triggers.push(BuildTriggerPolicy {
            type_: "ImageChange".to_owned(),
            image_change: None,
        });

        enable_default_triggers(&mut config);
        enable_default_triggers(&mut config);

        let kinds: Vec<_> = config
            .spec
            .triggers
            .iter()
            .map(|trigger| trigger.type_.as_str())
            .collect();
        assert_eq!(kinds, vec!["ImageChange", "ConfigChange"]);
    }

    #[test]
    fn build_config_shape() {
        let mut config = BuildConfig::new("sim-parent", BuildConfigSpec::default());
        set_git_source(&mut config, "https://github.com/ctron/hono-simulator", "master");
        set_docker_strategy(&mut config, Some("centos:7"));
        set_output_image_stream(&mut config, "sim-parent:latest");
        enable_default_triggers(&mut config);

        expect_test::expect![[r#"
            {
              "output": {
                "to": {
                  "kind": "ImageStreamTag",
                  "name": "sim-parent:latest"
                }
              },
              "source": {
                "git": {
                  "ref": "master",
                  "uri": "https://github.com/ctron/hono-simulator"
                },
                "type": "Git"
              },
              "strategy": {
                "dockerStrategy": {
                  "from": {
                    "kind": "ImageStreamTag",
                    "name": "centos:7"
                  }
                },
                "type": "Docker"
              },
              "triggers": [
                {
                  "type": "ConfigChange"
                },
                {
                  "imageChange": {},
                  "type": "ImageChange"
                }
              ]
            }"#]]
        .assert_eq(&serde_json::to_string_pretty(&serde_json::to_value(&config.spec).unwrap()).unwrap());
    }

    #[test]
    fn plain_docker_build_has_no_image_trigger() {
        let mut config = BuildConfig::new("b", BuildConfigSpec::default());
        set_docker_strategy(&mut config, Some("base:latest"));
        set_docker_strategy(&mut config, None);
        enable_default_triggers(&mut config);
        assert_eq!(config.spec.strategy.docker_strategy.unwrap().from, None);
        assert_eq!(config.spec.triggers.len(), 1);
        assert_eq!(config.spec.triggers[0].type_, "ConfigChange");
    }

    #[test]
    fn route_tls_modes() {
        let mut route = Route::new("console", RouteSpec::default());
        route.spec.host = Some("console.apps.example.com".to_owned());

        set_route_target(
            &mut route,
            "console",
            IntOrString::String("http".to_owned()),
            Some(TlsTermination::Reencrypt),
        );
        let tls = route.spec.tls.clone().unwrap();
        assert_eq!(tls.termination, "reencrypt");
        assert_eq!(tls.insecure_edge_termination_policy.as_deref(), Some("Redirect"));

        set_route_target(
            &mut route,
            "console",
            IntOrString::String("http".to_owned()),
            None,
        );
        assert_eq!(route.spec.tls, None);
        assert_eq!(route.spec.to.name, "console");
        // server assigned host survives
        assert_eq!(route.spec.host.as_deref(), Some("console.apps.example.com"));
    }

    #[test]
    fn tls_switch_drops_redirect() {
        let mut route = Route::new("console", RouteSpec::default());
        for termination in [TlsTermination::Edge, TlsTermination::Passthrough] {
            set_route_target(
                &mut route,
                "console",
                IntOrString::String("http".to_owned()),
                Some(TlsTermination::Reencrypt),
            );
            set_route_target(
                &mut route,
                "console",
                IntOrString::String("http".to_owned()),
                Some(termination),
            );
            let tls = route.spec.tls.clone().unwrap();
            assert_eq!(tls.insecure_edge_termination_policy, None, "{termination:?}");
        }
        assert_eq!(route.spec.tls.unwrap().termination, "passthrough");
    }
}
