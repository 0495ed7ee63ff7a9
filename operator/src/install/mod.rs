//! Create-or-update of derived objects.
//!
//! Every derived object goes through [`reconcile_object`]: the current object is fetched (or the
//! template is used when it does not exist yet), the caller's mutator brings it into the desired
//! shape and the mix-ins decorate its metadata. Only when the result differs from what the API
//! server returned is anything written back.
use std::{fmt::Debug, time::Duration};

use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, PostParams},
    client::Client,
    runtime::controller::Action,
    Api, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::{config::OperatorConfig, utils::Error, CONTROLLER_NAME};

pub mod corev1;
pub mod env;
pub mod mixin;
pub mod openshift;
pub mod owner;
pub mod rbac;

pub use mixin::MixIn;

/// Requeue delay used when a mutator asks for a requeue without naming a delay.
const DEFAULT_REQUEUE: Duration = Duration::from_secs(5);

/// Everything a mutator or mix-in may need besides the object itself.
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    /// Kube client
    pub client: &'a Client,
    /// Namespace of the object being reconciled, all derived objects land here
    pub namespace: &'a str,
    /// Operator settings
    pub config: &'a OperatorConfig,
}

/// Request to revisit the primary object, reported by a mutator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Requeue as soon as possible
    pub requeue: bool,
    /// Requeue after the given delay, zero means no delay requested
    pub requeue_after: Duration,
}

/// Write performed against the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and was replaced
    Updated,
    /// The object already had the desired shape
    Unchanged,
}

/// Result of a single create-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// What the mutator asked for
    pub outcome: Outcome,
    /// What was written
    pub operation: OperationResult,
}

impl From<Applied> for Outcome {
    fn from(value: Applied) -> Self {
        value.outcome
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::default()
    }
}

/// Adapt a mutator that never requests a requeue.
pub fn simple<K, F>(mutator: F) -> impl FnOnce(&mut K) -> Result<Outcome, Error> + Send
where
    F: FnOnce(&mut K) -> Result<(), Error> + Send,
{
    move |object| mutator(object).map(|_| Outcome::default())
}

/// Fetch or create the object named by `template` and bring it into shape.
///
/// The namespace always comes from the install context. Mutator and mix-ins run in order and
/// any error aborts before a write.
pub async fn reconcile_object<K, M>(
    cx: &InstallContext<'_>,
    template: K,
    mutator: M,
    mixins: &[MixIn],
) -> Result<Applied, Error>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    M: FnOnce(&mut K) -> Result<Outcome, Error> + Send,
{
    let name = template
        .meta()
        .name
        .clone()
        .ok_or_else(|| Error::Config(format!("{} template without a name", K::kind(&()))))?;
    let api: Api<K> = Api::namespaced(cx.client.clone(), cx.namespace);

    let existing = api.get_opt(&name).await?;
    let exists = existing.is_some();
    let mut object = existing.unwrap_or(template);
    object.meta_mut().namespace = Some(cx.namespace.to_owned());
    let original = object.clone();

    let outcome = mutator(&mut object)?;
    for mixin in mixins {
        mixin(cx, object.meta_mut())?;
    }

    let params = PostParams {
        field_manager: Some(CONTROLLER_NAME.to_owned()),
        ..Default::default()
    };
    let operation = if !exists {
        api.create(&params, &object).await?;
        OperationResult::Created
    } else if object != original {
        api.replace(&name, &params, &object).await?;
        OperationResult::Updated
    } else {
        OperationResult::Unchanged
    };

    match operation {
        OperationResult::Unchanged => debug!(kind = %K::kind(&()), name = %name, "unchanged"),
        _ => info!(kind = %K::kind(&()), name = %name, ?operation, "applied"),
    }

    Ok(Applied { outcome, operation })
}

/// Delete an object, a missing object is not an error.
pub async fn delete_if_exists<K>(cx: &InstallContext<'_>, name: &str) -> Result<(), Error>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    let api: Api<K> = Api::namespaced(cx.client.clone(), cx.namespace);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(kind = %K::kind(&()), name = %name, "deleted");
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.reason == "NotFound" => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Collects the results of all objects processed during one reconcile pass.
///
/// Requeue flags are OR-ed, delays take the maximum and errors are kept so a failing object does
/// not stop the remaining ones from being processed.
#[derive(Debug, Default)]
pub struct ReconcileResult {
    requeue: bool,
    requeue_after: Duration,
    errors: Vec<Error>,
}

impl ReconcileResult {
    /// Fold one result into the accumulated state.
    pub fn process<T: Into<Outcome>>(&mut self, result: Result<T, Error>) {
        match result {
            Ok(outcome) => {
                let outcome = outcome.into();
                self.requeue |= outcome.requeue;
                self.requeue_after = self.requeue_after.max(outcome.requeue_after);
            }
            Err(err) => self.errors.push(err),
        }
    }

    /// True if any processed result was an error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Turn the accumulated state into the controller's next action.
    pub fn into_action(mut self) -> Result<Action, Error> {
        match self.errors.len() {
            0 => {}
            1 => return Err(self.errors.remove(0)),
            _ => return Err(Error::Aggregate(self.errors)),
        }
        if !self.requeue_after.is_zero() {
            Ok(Action::requeue(self.requeue_after))
        } else if self.requeue {
            Ok(Action::requeue(DEFAULT_REQUEUE))
        } else {
            Ok(Action::await_change())
        }
    }
}
