//! Utils is shared functions and constants for the controllers

use std::{sync::Arc, time::Duration};

use kube::{client::Client, runtime::controller::Action};
use opentelemetry::{global, metrics::Counter, KeyValue};
use tracing::error;

use crate::{config::OperatorConfig, install::InstallContext};

/// Operator Context
pub struct Context {
    /// Kube client
    pub k_client: Client,
    /// Settings resolved once at start up
    pub config: OperatorConfig,
}

impl Context {
    /// Create new context
    pub fn new(k_client: Client, config: OperatorConfig) -> Self {
        Context { k_client, config }
    }

    /// Scope the context to the namespace of the object being reconciled.
    pub fn install<'a>(&'a self, namespace: &'a str) -> InstallContext<'a> {
        InstallContext {
            client: &self.k_client,
            namespace,
            config: &self.config,
        }
    }
}

/// Errors produced by the reconcile functions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic application error
    #[error("App error: {source}")]
    App {
        /// Underlying error
        #[from]
        source: anyhow::Error,
    },
    /// Error talking to the API server
    #[error("Kube error: {source}")]
    Kube {
        /// Underlying error
        #[from]
        source: kube::Error,
    },
    /// An owner reference could not be computed for an object
    #[error("Owner reference error: {0}")]
    OwnerReference(String),
    /// The operator or a resource is missing required settings
    #[error("Config error: {0}")]
    Config(String),
    /// Several objects failed during one reconcile pass
    #[error("{} errors during reconcile: {}", .0.len(), join(.0))]
    Aggregate(Vec<Error>),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Handle errors during reconciliation.
pub fn on_error<K>(_object: Arc<K>, error: &Error, _context: Arc<Context>) -> Action {
    error!(%error, "reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

/// Counts reconcile passes of a single controller, split by result.
pub struct ReconcileCounter {
    runs: Counter<u64>,
}

impl ReconcileCounter {
    /// Create a counter named `<kind>_reconcile_count` on the global meter.
    pub fn new(kind: &str) -> Self {
        let meter = global::meter("iot-simulator-operator");
        let runs = meter
            .u64_counter(format!("{kind}_reconcile_count"))
            .with_description(format!("Number of {kind} reconciles"))
            .init();
        Self { runs }
    }

    /// Record the outcome of one pass and hand it back.
    pub fn record<T, E>(&self, result: Result<T, E>) -> Result<T, E> {
        let value = if result.is_ok() { "ok" } else { "err" };
        self.runs.add(
            1,
            &[KeyValue {
                key: "result".into(),
                value: value.into(),
            }],
        );
        result
    }
}
