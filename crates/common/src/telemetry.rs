//! OTLP trace export for Parallax processes.
//!
//! With the `telemetry` feature enabled and `observability.enabled` set, spans from the
//! correlation flow are exported over OTLP/gRPC. Otherwise an identity layer is returned
//! so callers can compose the subscriber the same way in both builds.

use crate::config::ObservabilityConfig;
use anyhow::Result;
use tracing::info;

#[cfg(feature = "telemetry")]
use {
    opentelemetry::trace::TracerProvider, opentelemetry::KeyValue,
    opentelemetry_otlp::WithExportConfig,
    opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider, opentelemetry_sdk::Resource,
    tracing_opentelemetry::OpenTelemetryLayer,
};

use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

pub fn init_telemetry<S>(config: &ObservabilityConfig) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    if !config.enabled {
        return Ok(Box::new(tracing_subscriber::layer::Identity::new()));
    }

    #[cfg(feature = "telemetry")]
    {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint.as_str())
            .build()?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]))
            .build();

        let tracer = provider.tracer(config.service_name.clone());
        opentelemetry::global::set_tracer_provider(provider);

        info!(endpoint = %config.endpoint, "OTLP trace export enabled");
        Ok(Box::new(OpenTelemetryLayer::new(tracer)))
    }
    #[cfg(not(feature = "telemetry"))]
    {
        info!(
            endpoint = %config.endpoint,
            "Observability enabled but built without the `telemetry` feature; spans stay local"
        );
        Ok(Box::new(tracing_subscriber::layer::Identity::new()))
    }
}

/// Flush pending spans. Safe to call when export was never initialized.
pub fn shutdown_telemetry() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
