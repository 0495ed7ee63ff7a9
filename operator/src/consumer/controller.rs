use std::sync::Arc;

use futures::stream::StreamExt;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service};
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::{self, Config},
    },
    Api, ResourceExt,
};
use tracing::{debug, error, info};

use crate::{
    consumer::{
        workload::{consumer_workload_name, reconcile_consumer_workload},
        SimulatorConsumer,
    },
    install::{mixin::managed, owner::controller_owner, ReconcileResult},
    labels::MANAGED_BY_LABEL_SELECTOR,
    openshift::DeploymentConfig,
    utils::{on_error, Context, Error, ReconcileCounter},
    workload::reconcile_component_objects,
};

/// Start a controller for the SimulatorConsumer CRD.
pub async fn run(context: Arc<Context>) {
    let k_client = context.k_client.clone();
    let consumers: Api<SimulatorConsumer> = Api::all(k_client.clone());
    let owned = watcher::Config::default().labels(MANAGED_BY_LABEL_SELECTOR);

    let controller = Controller::new(consumers, Config::default())
        .owns(Api::<Service>::all(k_client.clone()), owned.clone());
    let controller = if context.config.platform.is_openshift() {
        controller.owns(Api::<DeploymentConfig>::all(k_client), owned)
    } else {
        controller.owns(Api::<Deployment>::all(k_client), owned)
    };

    controller
        .run(reconcile, on_error, context)
        .for_each(|rec_res| async move {
            match rec_res {
                Ok((consumer, _)) => {
                    info!(consumer.name, "reconcile success");
                }
                Err(err) => {
                    error!(?err, "reconcile error")
                }
            }
        })
        .await;
}

/// Perform a reconcile pass for the SimulatorConsumer CRD
async fn reconcile(consumer: Arc<SimulatorConsumer>, cx: Arc<Context>) -> Result<Action, Error> {
    ReconcileCounter::new("simulator_consumer").record(reconcile_(consumer, cx).await)
}

async fn reconcile_(consumer: Arc<SimulatorConsumer>, cx: Arc<Context>) -> Result<Action, Error> {
    debug!(name = %consumer.name_any(), spec = ?consumer.spec, "reconcile");

    let ns = consumer
        .namespace()
        .ok_or_else(|| Error::Config("SimulatorConsumer without namespace".to_owned()))?;
    let install = cx.install(&ns);
    let mut result = ReconcileResult::default();

    let mixins = [controller_owner(consumer.as_ref()), managed()];
    result.process(reconcile_consumer_workload(&install, &consumer, &mixins).await);
    reconcile_component_objects(
        &install,
        consumer.as_ref(),
        &consumer_workload_name(&consumer),
        &mut result,
    )
    .await;

    result.into_action()
}
