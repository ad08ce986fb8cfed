//! Prometheus-backed meter provider.
//!
//! The metrics side is deliberately small: an `opentelemetry-prometheus`
//! exporter reads from the SDK pipeline into a [`prometheus::Registry`], and
//! the registry is what an HTTP scrape endpoint serves.

use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::TelemetryError;

/// Build a meter provider that exports through the given Prometheus registry.
///
/// # Errors
///
/// Returns an error if the Prometheus exporter cannot be built.
pub fn build_meter_provider(
    registry: &Registry,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    Ok(SdkMeterProvider::builder()
        .with_reader(exporter)
        .with_resource(resource)
        .build())
}

/// Render the registry contents in the Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_text(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
