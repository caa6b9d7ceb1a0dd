// Structured logging, OpenTelemetry tracing and Prometheus metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::models::ScheduleAction;

const SERVICE_NAME: &str = "offers-scheduler";

/// Install the global subscriber: JSON lines on stdout, plus OTLP span export
/// when `tracing_endpoint` is set.
///
/// `RUST_LOG` takes precedence over `log_level`.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", log_level, e))?,
    };

    let otel_layer = tracing_endpoint
        .map(init_tracer)
        .transpose()?
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Global subscriber already installed: {}", e))?;

    tracing::info!(
        log_level,
        otlp = tracing_endpoint.is_some(),
        "Logging initialized"
    );
    Ok(())
}

/// OTLP exporter tagged with the scheduler's service name and version
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build OTLP exporter for {}: {}", endpoint, e))?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);
    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(resource),
        )
        .build();

    let tracer = provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(provider);
    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Serve `/metrics` on `metrics_port` and register the offer metric
/// descriptions
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter on {}: {}", addr, e))?;

    describe_counter!(
        "offer_transitions_total",
        "Offer status transitions applied, by action and trigger"
    );
    describe_counter!(
        "offer_transition_failures_total",
        "Offer transition callbacks that failed"
    );
    describe_counter!(
        "offer_schedule_lookup_misses_total",
        "Transitions requested for offers with no schedule entry"
    );
    describe_gauge!("scheduled_offers", "Offers with at least one armed timer");
    describe_histogram!("chart_buckets", "Buckets produced per chart request");

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

#[inline]
pub fn record_offer_transition(action: ScheduleAction, trigger: &'static str) {
    counter!(
        "offer_transitions_total",
        "action" => action.to_string(),
        "trigger" => trigger
    )
    .increment(1);
}

#[inline]
pub fn record_transition_failure(action: ScheduleAction) {
    counter!("offer_transition_failures_total", "action" => action.to_string()).increment(1);
}

#[inline]
pub fn record_schedule_lookup_miss(action: ScheduleAction) {
    counter!("offer_schedule_lookup_misses_total", "action" => action.to_string()).increment(1);
}

/// Set the number of offers currently holding armed timers
#[inline]
pub fn update_scheduled_offers(count: usize) {
    gauge!("scheduled_offers").set(count as f64);
}

#[inline]
pub fn record_chart_buckets(count: usize) {
    histogram!("chart_buckets").record(count as f64);
}
