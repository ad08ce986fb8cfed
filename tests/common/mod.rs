//! Test utilities shared by the integration tests.

use std::sync::Arc;

use flare::config::JsonConfig;
use flare::telemetry::Telemetry;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;

/// A minimal valid config pointing at a local collector.
pub fn base_config() -> JsonConfig {
    JsonConfig::new(serde_json::json!({
        "telemetry": {
            "otlp": {
                "endpoint": "http://localhost:4317",
                "insecure": true
            }
        }
    }))
}

/// A `Telemetry` facade wired to an in-memory exporter.
///
/// Returns the provider as well; it must stay alive while spans are started.
pub fn recording_telemetry() -> (Arc<Telemetry>, InMemorySpanExporter, TracerProvider) {
    flare::logging::init_test_tracing();
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let telemetry = Arc::new(Telemetry::from_provider(&provider, "test"));
    (telemetry, exporter, provider)
}
