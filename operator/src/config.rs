//! Operator wide settings, resolved once at start up and shared by all controllers.
use anyhow::{Context as _, Result};

use crate::{
    platform::Platform,
    simulator::{EndpointSpec, Simulator},
};

/// Registry and organization the workload images are pulled from.
pub const DEFAULT_IMAGE_BASE: &str = "docker.io/ctron";
/// Tag of the workload images.
pub const DEFAULT_IMAGE_TAG: &str = ":latest";
/// Prefix of the git repositories OpenShift builds from.
pub const DEFAULT_GIT_PREFIX: &str = "https://github.com/ctron";
/// Git reference OpenShift builds from.
pub const DEFAULT_GIT_REF: &str = "master";

/// Raw operator settings, as read from the command line or environment.
///
/// Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Registry and organization of the images
    pub image_base: Option<String>,
    /// Image tag, a leading `:` is added if missing
    pub image_tag: Option<String>,
    /// Git prefix of the build repositories
    pub git_prefix: Option<String>,
    /// Git reference of the builds
    pub git_ref: Option<String>,
    /// Only reconcile the simulator of this name
    pub watch_simulator_name: Option<String>,
    /// JSON encoded endpoint used by simulators without their own
    pub simulator_config: Option<String>,
}

/// Git repository and reference a build uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSource {
    /// Repository URI
    pub uri: String,
    /// Branch, tag or commit
    pub reference: String,
}

/// Immutable settings of the running operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// Cluster flavour
    pub platform: Platform,
    /// Image of the producer and consumer workloads
    pub simulator_image: String,
    /// Image of the console
    pub console_image: String,
    /// Prefix of build repositories without an override
    pub git_prefix: String,
    /// Reference of build repositories without an override
    pub git_ref: String,
    /// Only reconcile the simulator of this name
    pub watch_simulator_name: Option<String>,
    /// Endpoint used by simulators without their own
    pub default_endpoint: Option<EndpointSpec>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Normalize an image tag to start with `:`.
pub fn image_tag(tag: Option<&str>) -> String {
    match tag {
        None | Some("") => DEFAULT_IMAGE_TAG.to_owned(),
        Some(tag) if tag.starts_with(':') => tag.to_owned(),
        Some(tag) => format!(":{tag}"),
    }
}

impl OperatorConfig {
    /// Resolve the raw options for the given platform.
    pub fn new(platform: Platform, options: &ConfigOptions) -> Result<Self> {
        let base = non_empty(&options.image_base).unwrap_or(DEFAULT_IMAGE_BASE);
        let tag = image_tag(non_empty(&options.image_tag));
        let default_endpoint = non_empty(&options.simulator_config)
            .map(|json| serde_json::from_str::<EndpointSpec>(json))
            .transpose()
            .context("SIMULATOR_CONFIG should be a JSON encoded endpoint")?;

        Ok(Self {
            platform,
            simulator_image: format!("{base}/iot-hono-simulator{tag}"),
            console_image: format!("{base}/iot-simulator-console{tag}"),
            git_prefix: non_empty(&options.git_prefix)
                .unwrap_or(DEFAULT_GIT_PREFIX)
                .to_owned(),
            git_ref: non_empty(&options.git_ref)
                .unwrap_or(DEFAULT_GIT_REF)
                .to_owned(),
            watch_simulator_name: non_empty(&options.watch_simulator_name).map(str::to_owned),
            default_endpoint,
        })
    }

    /// Git source of a build, honouring the simulator's overrides.
    pub fn build_source(&self, simulator: &Simulator, repo: &str) -> BuildSource {
        let git = simulator.spec.builds.get(repo).map(|build| &build.git);
        let uri = git
            .and_then(|git| non_empty(&git.uri))
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}/{repo}", self.git_prefix));
        let reference = git
            .and_then(|git| non_empty(&git.reference))
            .unwrap_or(self.git_ref.as_str())
            .to_owned();
        BuildSource { uri, reference }
    }

    /// False if the operator is restricted to a different simulator.
    pub fn accepts(&self, simulator_name: &str) -> bool {
        self.watch_simulator_name
            .as_deref()
            .map_or(true, |name| name == simulator_name)
    }

    /// Endpoint of the simulator, falling back to the operator's default.
    pub fn endpoint<'a>(&'a self, simulator: &'a Simulator) -> Option<&'a EndpointSpec> {
        simulator
            .spec
            .endpoint
            .as_ref()
            .or(self.default_endpoint.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::simulator::{BuildSpec, GitSpec, SimulatorSpec};
    use expect_test::expect;

    #[test]
    fn defaults() {
        let config = OperatorConfig::new(Platform::Kubernetes, &ConfigOptions::default()).unwrap();
        expect![[r#"
            OperatorConfig {
                platform: Kubernetes,
                simulator_image: "docker.io/ctron/iot-hono-simulator:latest",
                console_image: "docker.io/ctron/iot-simulator-console:latest",
                git_prefix: "https://github.com/ctron",
                git_ref: "master",
                watch_simulator_name: None,
                default_endpoint: None,
            }
        "#]]
        .assert_debug_eq(&config);
    }

    #[test]
    fn image_tag_gets_colon() {
        assert_eq!(image_tag(Some("0.1.2")), ":0.1.2");
        assert_eq!(image_tag(Some(":0.1.2")), ":0.1.2");
        assert_eq!(image_tag(Some("")), ":latest");
        assert_eq!(image_tag(None), ":latest");

        let config = OperatorConfig::new(
            Platform::OpenShift,
            &ConfigOptions {
                image_base: Some("quay.io/me".to_owned()),
                image_tag: Some("1.0".to_owned()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.simulator_image, "quay.io/me/iot-hono-simulator:1.0");
        assert_eq!(config.console_image, "quay.io/me/iot-simulator-console:1.0");
    }

    #[test]
    fn build_source_overrides() {
        let config = OperatorConfig::new(Platform::OpenShift, &ConfigOptions::default()).unwrap();
        let mut simulator = Simulator::new("sim1", SimulatorSpec::default());

        assert_eq!(
            config.build_source(&simulator, "hono-simulator"),
            BuildSource {
                uri: "https://github.com/ctron/hono-simulator".to_owned(),
                reference: "master".to_owned(),
            }
        );

        simulator.spec.builds = BTreeMap::from_iter([
            (
                "hono-simulator".to_owned(),
                BuildSpec {
                    git: GitSpec {
                        uri: Some("https://example.com/fork".to_owned()),
                        reference: None,
                    },
                },
            ),
            (
                "iot-simulator-console".to_owned(),
                BuildSpec {
                    git: GitSpec {
                        uri: Some(String::new()),
                        reference: Some("develop".to_owned()),
                    },
                },
            ),
        ]);

        assert_eq!(
            config.build_source(&simulator, "hono-simulator"),
            BuildSource {
                uri: "https://example.com/fork".to_owned(),
                reference: "master".to_owned(),
            }
        );
        assert_eq!(
            config.build_source(&simulator, "iot-simulator-console"),
            BuildSource {
                uri: "https://github.com/ctron/iot-simulator-console".to_owned(),
                reference: "develop".to_owned(),
            }
        );
    }

    #[test]
    fn watch_filter() {
        let mut config =
            OperatorConfig::new(Platform::Kubernetes, &ConfigOptions::default()).unwrap();
        assert!(config.accepts("anything"));
        config.watch_simulator_name = Some("sim1".to_owned());
        assert!(config.accepts("sim1"));
        assert!(!config.accepts("sim2"));
    }

    #[test]
    fn default_endpoint_from_json() {
        let options = ConfigOptions {
            simulator_config: Some(
                r#"{"messaging":{"host":"amqp.example.com","port":5671,"user":"u","password":"p"}}"#
                    .to_owned(),
            ),
            ..Default::default()
        };
        let config = OperatorConfig::new(Platform::Kubernetes, &options).unwrap();
        let simulator = Simulator::new("sim1", SimulatorSpec::default());
        let endpoint = config.endpoint(&simulator).unwrap();
        assert_eq!(endpoint.messaging.host, "amqp.example.com");
        assert_eq!(endpoint.messaging.port, 5671);
        assert_eq!(endpoint.registry.url, "");

        let broken = ConfigOptions {
            simulator_config: Some("{".to_owned()),
            ..Default::default()
        };
        assert!(OperatorConfig::new(Platform::Kubernetes, &broken).is_err());
    }
}
