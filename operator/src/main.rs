//! Operator is a long lived process that provisions IoT simulators, their producers and consumers.
#![deny(missing_docs)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use iot_simulator_common::telemetry;
use iot_simulator_operator::{
    config::{ConfigOptions, OperatorConfig},
    platform::Platform,
    utils::Context,
};
use kube::Client;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "OPERATOR_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[arg(long, env = "OPERATOR_METRICS_ADDR", default_value = "0.0.0.0:9464")]
    metrics_addr: SocketAddr,
}

/// Available Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the daemon
    Daemon(Opts),
}

/// Settings of the running operator
#[derive(Args, Debug)]
pub struct Opts {
    /// Only reconcile the simulator of this name
    #[arg(long, env = "WATCH_SIMULATOR_NAME")]
    watch_simulator_name: Option<String>,

    /// JSON encoded endpoint for simulators without their own
    #[arg(long, env = "SIMULATOR_CONFIG")]
    simulator_config: Option<String>,

    /// Registry and organization of the workload images
    #[arg(long, env = "IMAGE_BASE")]
    image_base: Option<String>,

    /// Tag of the workload images
    #[arg(long, env = "IMAGE_TAG")]
    image_tag: Option<String>,

    /// Prefix of the git repositories OpenShift builds from
    #[arg(long, env = "DEFAULT_GIT_PREFIX")]
    default_git_prefix: Option<String>,

    /// Git reference OpenShift builds from
    #[arg(long, env = "DEFAULT_GIT_REF")]
    default_git_ref: Option<String>,

    /// Force the platform, `true` selects OpenShift, anything else Kubernetes
    #[arg(long, env = "USE_OPENSHIFT")]
    use_openshift: Option<String>,
}

impl From<Opts> for ConfigOptions {
    fn from(opts: Opts) -> Self {
        ConfigOptions {
            image_base: opts.image_base,
            image_tag: opts.image_tag,
            git_prefix: opts.default_git_prefix,
            git_ref: opts.default_git_ref,
            watch_simulator_name: opts.watch_simulator_name,
            simulator_config: opts.simulator_config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    telemetry::init_tracing(args.otlp_endpoint.clone()).await?;
    let (metrics_provider, registry) = telemetry::init_metrics()?;
    let metrics_server = telemetry::serve_metrics(args.metrics_addr, registry);

    info!(?args.command, ?args.otlp_endpoint, %args.metrics_addr, "starting operator");
    match args.command {
        Command::Daemon(opts) => {
            let client = Client::try_default().await?;
            let platform = Platform::detect(opts.use_openshift.as_deref(), &client).await;
            let config = OperatorConfig::new(platform, &opts.into())?;
            info!(?config.platform, %config.simulator_image, %config.console_image, "configured");

            let context = Arc::new(Context::new(client, config));
            tokio::join!(
                iot_simulator_operator::simulator::controller::run(context.clone()),
                iot_simulator_operator::producer::controller::run(context.clone()),
                iot_simulator_operator::consumer::controller::run(context.clone()),
                iot_simulator_operator::settings::controller::run(context),
            );
        }
    };

    // Flush metrics before shutdown
    metrics_server.abort();
    metrics_provider.shutdown()?;
    Ok(())
}
