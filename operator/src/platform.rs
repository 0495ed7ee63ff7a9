//! Detection of the cluster flavour, decided once at start up.
use async_trait::async_trait;
use kube::Client;
use tracing::{debug, info};

/// API group version only served by OpenShift clusters.
pub const ROUTE_API: &str = "route.openshift.io/v1";

/// Kind of cluster the operator runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Plain Kubernetes, workloads are Deployments
    Kubernetes,
    /// OpenShift, workloads are DeploymentConfigs fed by image builds
    OpenShift,
}

impl Platform {
    /// Interpret an explicit override, `true` in any case selects OpenShift.
    ///
    /// An unset or empty value means no override.
    pub fn from_override(value: Option<&str>) -> Option<Platform> {
        match value {
            None | Some("") => None,
            Some(value) if value.eq_ignore_ascii_case("true") => Some(Platform::OpenShift),
            Some(_) => Some(Platform::Kubernetes),
        }
    }

    /// Use the override if present, otherwise ask the API server for the route API.
    pub async fn detect(value: Option<&str>, probe: &(impl ApiProbe + Sync)) -> Platform {
        if let Some(platform) = Platform::from_override(value) {
            info!(?platform, "platform set by override");
            return platform;
        }
        let platform = if probe.has_api_group(ROUTE_API).await {
            Platform::OpenShift
        } else {
            Platform::Kubernetes
        };
        info!(?platform, "platform detected");
        platform
    }

    /// True if OpenShift kinds should be emitted.
    pub fn is_openshift(self) -> bool {
        self == Platform::OpenShift
    }
}

/// Discovery of API groups.
#[async_trait]
pub trait ApiProbe {
    /// True if the API server serves the given group version.
    async fn has_api_group(&self, group_version: &str) -> bool;
}

#[async_trait]
impl ApiProbe for Client {
    async fn has_api_group(&self, group_version: &str) -> bool {
        match self.list_api_group_resources(group_version).await {
            Ok(_) => true,
            Err(err) => {
                debug!(group_version, %err, "api group not available");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, predicate};

    mock! {
        Probe {}
        #[async_trait]
        impl ApiProbe for Probe {
            async fn has_api_group(&self, group_version: &str) -> bool;
        }
    }

    #[test]
    fn override_values() {
        assert_eq!(Platform::from_override(None), None);
        assert_eq!(Platform::from_override(Some("")), None);
        assert_eq!(
            Platform::from_override(Some("TRUE")),
            Some(Platform::OpenShift)
        );
        assert_eq!(
            Platform::from_override(Some("true")),
            Some(Platform::OpenShift)
        );
        assert_eq!(
            Platform::from_override(Some("false")),
            Some(Platform::Kubernetes)
        );
        assert_eq!(
            Platform::from_override(Some("yes")),
            Some(Platform::Kubernetes)
        );
    }

    #[tokio::test]
    async fn override_skips_probe() {
        let mut probe = MockProbe::new();
        probe.expect_has_api_group().never();
        assert_eq!(
            Platform::detect(Some("True"), &probe).await,
            Platform::OpenShift
        );
        assert_eq!(
            Platform::detect(Some("no"), &probe).await,
            Platform::Kubernetes
        );
    }

    #[tokio::test]
    async fn probe_decides_without_override() {
        let mut probe = MockProbe::new();
        probe
            .expect_has_api_group()
            .with(predicate::eq(ROUTE_API))
            .times(1)
            .return_const(true);
        assert_eq!(Platform::detect(None, &probe).await, Platform::OpenShift);

        let mut probe = MockProbe::new();
        probe
            .expect_has_api_group()
            .times(1)
            .return_const(false);
        assert_eq!(Platform::detect(Some(""), &probe).await, Platform::Kubernetes);
    }
}
