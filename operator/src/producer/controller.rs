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
    install::{mixin::managed, owner::controller_owner, ReconcileResult},
    labels::MANAGED_BY_LABEL_SELECTOR,
    openshift::DeploymentConfig,
    producer::{workload::reconcile_producer_workload, SimulatorProducer},
    utils::{on_error, Context, Error, ReconcileCounter},
    workload::reconcile_component_objects,
};

use super::workload::producer_workload_name;

/// Start a controller for the SimulatorProducer CRD.
pub async fn run(context: Arc<Context>) {
    let k_client = context.k_client.clone();
    let producers: Api<SimulatorProducer> = Api::all(k_client.clone());
    let owned = watcher::Config::default().labels(MANAGED_BY_LABEL_SELECTOR);

    let controller = Controller::new(producers, Config::default())
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
                Ok((producer, _)) => {
                    info!(producer.name, "reconcile success");
                }
                Err(err) => {
                    error!(?err, "reconcile error")
                }
            }
        })
        .await;
}

/// Perform a reconcile pass for the SimulatorProducer CRD
async fn reconcile(producer: Arc<SimulatorProducer>, cx: Arc<Context>) -> Result<Action, Error> {
    ReconcileCounter::new("simulator_producer").record(reconcile_(producer, cx).await)
}

async fn reconcile_(
    producer: Arc<SimulatorProducer>,
    cx: Arc<Context>,
) -> Result<Action, Error> {
    debug!(name = %producer.name_any(), spec = ?producer.spec, "reconcile");

    let ns = producer
        .namespace()
        .ok_or_else(|| Error::Config("SimulatorProducer without namespace".to_owned()))?;
    let install = cx.install(&ns);
    let mut result = ReconcileResult::default();

    let mixins = [controller_owner(producer.as_ref()), managed()];
    result.process(reconcile_producer_workload(&install, &producer, &mixins).await);
    reconcile_component_objects(
        &install,
        producer.as_ref(),
        &producer_workload_name(&producer),
        &mut result,
    )
    .await;

    result.into_action()
}
