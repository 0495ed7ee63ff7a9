//! OpenShift builds producing the simulator and console images from git.
use crate::{
    config::BuildSource,
    install::{
        openshift::{
            enable_default_triggers, reconcile_build_config, reconcile_empty_image_stream,
            set_docker_strategy, set_git_source, set_output_image_stream,
        },
        simple, InstallContext, MixIn, ReconcileResult,
    },
    openshift::BuildConfig,
    simulator::{console::console_name, Simulator},
    workload::parent_image_stream,
};

/// Repository the producer and consumer image is built from.
pub const SIMULATOR_REPOSITORY: &str = "hono-simulator";
/// Repository the console image is built from.
pub const CONSOLE_REPOSITORY: &str = "iot-simulator-console";

/// Image stream and build of one image.
struct ImageBuild {
    name: String,
    source: BuildSource,
}

impl ImageBuild {
    fn new(cx: &InstallContext<'_>, simulator: &Simulator, name: String, repository: &str) -> Self {
        Self {
            name,
            source: cx.config.build_source(simulator, repository),
        }
    }

    async fn reconcile(&self, cx: &InstallContext<'_>, mixins: &[MixIn], result: &mut ReconcileResult) {
        result.process(reconcile_empty_image_stream(cx, &self.name, mixins).await);
        result.process(
            reconcile_build_config(
                cx,
                &self.name,
                simple(|config: &mut BuildConfig| {
                    set_git_source(config, &self.source.uri, &self.source.reference);
                    set_docker_strategy(config, None);
                    set_output_image_stream(config, &format!("{}:latest", self.name));
                    enable_default_triggers(config);
                    Ok(())
                }),
                mixins,
            )
            .await,
        );
    }
}

/// Reconcile image streams and builds of the simulator and console images.
pub async fn reconcile_builds(
    cx: &InstallContext<'_>,
    simulator: &Simulator,
    instance: &str,
    mixins: &[MixIn],
    result: &mut ReconcileResult,
) {
    let builds = [
        ImageBuild::new(
            cx,
            simulator,
            parent_image_stream(instance),
            SIMULATOR_REPOSITORY,
        ),
        ImageBuild::new(cx, simulator, console_name(instance), CONSOLE_REPOSITORY),
    ];
    for build in &builds {
        build.reconcile(cx, mixins, result).await;
    }
}
