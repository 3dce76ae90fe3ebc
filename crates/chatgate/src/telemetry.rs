//! Logging to stderr as JSON, plus OTLP traces and metrics when an exporter
//! can be built. OTLP endpoints come from the standard `OTEL_EXPORTER_OTLP_*`
//! variables.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OTEL_SERVICE_NAME: &str = "chatgate";

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

static PROVIDERS: OnceLock<Providers> = OnceLock::new();

pub fn init_logger(prefix: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .json();

    match try_init_otel(prefix) {
        Ok(providers) => {
            opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
            opentelemetry::global::set_tracer_provider(providers.tracer.clone());
            opentelemetry::global::set_meter_provider(providers.meter.clone());

            let tracer = providers.tracer.tracer(OTEL_SERVICE_NAME);
            let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let already_set = PROVIDERS.set(providers).is_err();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(otel_trace_layer)
                .init();

            if already_set {
                tracing::warn!("OpenTelemetry providers already initialized; keeping existing ones");
            }
            tracing::info!("Logger initialized with OpenTelemetry");
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();

            tracing::warn!(error = %e, "Logger initialized without OpenTelemetry (init failed)");
        }
    }
}

fn try_init_otel(prefix: &str) -> Result<Providers, Box<dyn std::error::Error>> {
    let resource = Resource::builder()
        .with_service_name(OTEL_SERVICE_NAME)
        .with_attributes(vec![KeyValue::new("chatgate.prefix", prefix.to_owned())])
        .build();

    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(SpanExporter::builder().with_http().build()?)
        .with_resource(resource.clone())
        .build();

    let reader = PeriodicReader::builder(MetricExporter::builder().with_http().build()?)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();
    let meter = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    Ok(Providers { tracer, meter })
}

/// Flushes and shuts down whatever [`init_logger`] installed.
pub fn shutdown_otel() {
    let Some(providers) = PROVIDERS.get() else {
        return;
    };
    tracing::info!("Shutting down OpenTelemetry providers");

    if let Err(e) = providers.tracer.force_flush() {
        eprintln!("Failed to flush tracer provider: {e}");
    }
    if let Err(e) = providers.meter.force_flush() {
        eprintln!("Failed to flush meter provider: {e}");
    }
    if let Err(e) = providers.tracer.shutdown() {
        eprintln!("Failed to shutdown tracer provider: {e}");
    }
    if let Err(e) = providers.meter.shutdown() {
        eprintln!("Failed to shutdown meter provider: {e}");
    }
}
