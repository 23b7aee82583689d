use anyhow::Result;
use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::{
    trace::{BatchSpanProcessor, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const SERVICE_NAME: &str = "zbxgate-server";

/// Initialize stdout logging, plus OTLP span export when an endpoint is configured.
///
/// Returns the `SdkTracerProvider` when export is enabled. It must be kept
/// alive for the duration of the program and shut down before exit to flush
/// remaining spans.
///
/// Configuration is via environment variables:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` (unset: no export)
/// - `RUST_LOG` (default: `info`)
pub fn init_telemetry(session_id: &str) -> Result<Option<SdkTracerProvider>> {
    let provider = if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        Some(build_provider(session_id)?)
    } else {
        None
    };

    let otel_layer = provider
        .as_ref()
        .map(|p| OpenTelemetryLayer::new(p.tracer(SERVICE_NAME)));

    let fmt_layer = fmt::layer().with_target(true).with_level(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Ok(provider)
}

fn build_provider(session_id: &str) -> Result<SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .with_attribute(KeyValue::new("session.id", session_id.to_string()))
        .build();

    let exporter = SpanExporter::builder().with_tonic().build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .build())
}
