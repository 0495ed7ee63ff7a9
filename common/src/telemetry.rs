//! Provides helper functions for initializing telemetry collection and publication.
use std::{convert::Infallible, net::SocketAddr};

use anyhow::Result;
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{metrics::MeterProvider as SdkMeterProvider, runtime, Resource};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::task::JoinHandle;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "iot-simulator-operator";

fn resource() -> Resource {
    Resource::new(vec![
        KeyValue::new(
            "hostname",
            gethostname::gethostname().to_string_lossy().into_owned(),
        ),
        KeyValue::new("service.name", SERVICE_NAME),
    ])
}

/// Initialize logging and, when an OTLP endpoint is given, trace export.
pub async fn init_tracing(otlp_endpoint: Option<String>) -> Result<()> {
    // Default to INFO if no env is specified
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    let telemetry = if let Some(endpoint) = otlp_endpoint {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(opentelemetry_sdk::trace::config().with_resource(resource()))
            .install_batch(runtime::Tokio)?;
        let otlp_filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env()?;
        Some(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(otlp_filter),
        )
    } else {
        None
    };

    let logger = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .compact()
        .with_filter(log_filter);

    let collector = tracing_subscriber::Registry::default()
        .with(telemetry)
        .with(logger);

    #[cfg(feature = "tokio-console")]
    let collector = {
        let console_filter = EnvFilter::builder().parse("tokio=trace,runtime=trace")?;
        let console_layer = console_subscriber::spawn().with_filter(console_filter);
        collector.with(console_layer)
    };

    tracing::subscriber::set_global_default(collector)?;

    Ok(())
}

/// Install a global meter provider backed by a prometheus registry.
///
/// The returned provider must be kept alive and shut down before exit so the last
/// values are flushed.
pub fn init_metrics() -> Result<(SdkMeterProvider, Registry)> {
    let registry = Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;
    let provider = SdkMeterProvider::builder()
        .with_reader(exporter)
        .with_resource(resource())
        .build();
    opentelemetry::global::set_meter_provider(provider.clone());
    Ok((provider, registry))
}

/// Serve the registry in the prometheus text format on `/metrics`.
pub fn serve_metrics(addr: SocketAddr, registry: Registry) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let make_svc = make_service_fn(move |_conn| {
            let registry = registry.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let registry = registry.clone();
                    async move { Ok::<_, Infallible>(metrics_response(&req, &registry)) }
                }))
            }
        });
        tracing::info!(%addr, "serving metrics");
        Server::try_bind(&addr)?.serve(make_svc).await?;
        Ok(())
    })
}

fn metrics_response(req: &Request<Body>, registry: &Registry) -> Response<Body> {
    if req.uri().path() != "/metrics" {
        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::NOT_FOUND;
        return resp;
    }

    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        Ok(()) => {
            let mut resp = Response::new(Body::from(buffer));
            resp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            );
            resp
        }
        Err(err) => {
            tracing::warn!(%err, "failed to encode metrics");
            let mut resp = Response::new(Body::from(err.to_string()));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}
