//! OTLP trace provider construction.
//!
//! Translates `telemetry.otlp.*` config keys into SDK options:
//! - exporter: endpoint, gzip compression, request timeout, gRPC metadata
//!   headers, and a lazy tonic channel with a connect timeout when
//!   `reconnect` is set
//! - batch span processor: queue size, batch size, batch timeout, export
//!   timeout
//! - sampler: see [`crate::sampler`]
//!
//! The endpoint is the only required key; everything else has a default.

use std::time::Duration;

use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, RandomIdGenerator, TracerProvider,
};
use opentelemetry_sdk::{runtime, Resource};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

use crate::config::Config;
use crate::error::TelemetryError;
use crate::sampler::{sampler_from_config, SamplerChoice};

const ENDPOINT: &str = "telemetry.otlp.endpoint";
// Earlier releases read the endpoint from this misspelled path; keep
// honoring it so existing deployments do not silently lose their endpoint.
const ENDPOINT_LEGACY: &str = "telemetry.oltp.endpoint";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BATCH_SIZE: u64 = 512;
const DEFAULT_QUEUE_SIZE: u64 = 2048;

/// Exporter retry settings, as configured.
///
/// The Rust OTLP tonic exporter handles transient failures internally and
/// exposes no backoff tuning, so these values are parsed and surfaced in the
/// logs rather than applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Whether retry was requested.
    pub enabled: bool,
    /// First backoff interval.
    pub initial_interval: Duration,
    /// Backoff ceiling.
    pub max_interval: Duration,
    /// Total time budget across attempts.
    pub max_elapsed_time: Duration,
}

impl RetryConfig {
    fn from_config(cfg: &dyn Config) -> Self {
        Self {
            enabled: cfg.get_bool("telemetry.otlp.retry.enable", true),
            initial_interval: cfg.get_duration(
                "telemetry.otlp.retry.initialInterval",
                Duration::from_secs(5),
            ),
            max_interval: cfg
                .get_duration("telemetry.otlp.retry.maxInterval", Duration::from_secs(30)),
            max_elapsed_time: cfg.get_duration(
                "telemetry.otlp.retry.maxElapsedTime",
                Duration::from_secs(60),
            ),
        }
    }
}

/// Read the OTLP endpoint, preferring the canonical key.
fn endpoint_from_config(cfg: &dyn Config) -> Result<String, TelemetryError> {
    cfg.get_str(ENDPOINT)
        .or_else(|| cfg.get_str(ENDPOINT_LEGACY))
        .filter(|ep| !ep.trim().is_empty())
        .ok_or(TelemetryError::MissingConfig(ENDPOINT))
}

/// Prefix the endpoint with a scheme when it has none.
fn normalize_endpoint(endpoint: &str, insecure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if insecure {
        format!("http://{endpoint}")
    } else {
        format!("https://{endpoint}")
    }
}

/// Build a gRPC metadata map from the `telemetry.otlp.headers.*` string map.
fn metadata_from_headers(cfg: &dyn Config) -> Result<MetadataMap, TelemetryError> {
    let mut metadata = MetadataMap::new();
    for (name, value) in cfg.get_str_map("telemetry.otlp.headers") {
        let key: MetadataKey<Ascii> = MetadataKey::from_bytes(
            name.to_ascii_lowercase().as_bytes(),
        )
        .map_err(|e| TelemetryError::InvalidConfig {
            key: format!("telemetry.otlp.headers.{name}"),
            reason: e.to_string(),
        })?;
        let value: MetadataValue<Ascii> =
            value.parse().map_err(|e: tonic::metadata::errors::InvalidMetadataValue| {
                TelemetryError::InvalidConfig {
                    key: format!("telemetry.otlp.headers.{name}"),
                    reason: e.to_string(),
                }
            })?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

/// Build a tracer provider exporting to the configured OTLP collector.
///
/// # Errors
///
/// Returns an error when the endpoint key is missing, a config value cannot
/// be translated, or the exporter fails to build. Must be called within a
/// Tokio runtime (the batch processor spawns its export task there).
pub fn build_tracer_provider(
    cfg: &dyn Config,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let endpoint = endpoint_from_config(cfg)?;
    let insecure = cfg.get_bool("telemetry.otlp.insecure", false);
    let endpoint = normalize_endpoint(&endpoint, insecure);
    let timeout = cfg.get_duration("telemetry.otlp.timeout", DEFAULT_REQUEST_TIMEOUT);
    let reconnect = cfg.get_duration("telemetry.otlp.reconnect", Duration::ZERO);
    let compress = cfg.get_bool("telemetry.otlp.compress", false);
    let metadata = metadata_from_headers(cfg)?;

    let retry = RetryConfig::from_config(cfg);
    if !retry.enabled {
        tracing::debug!("OTLP retry disabled in config; exporter retry behavior is built-in");
    } else {
        tracing::debug!(?retry, "OTLP retry settings noted; backoff tuning is handled by the exporter");
    }

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_timeout(timeout)
        .with_metadata(metadata);
    if compress {
        builder = builder.with_compression(Compression::Gzip);
    }
    builder = if reconnect > Duration::ZERO {
        // A custom lazy channel is the only way to control connect timeout.
        let channel = tonic::transport::Endpoint::from_shared(endpoint.clone())?
            .connect_timeout(reconnect)
            .timeout(timeout)
            .connect_lazy();
        builder.with_channel(channel)
    } else {
        builder.with_endpoint(endpoint.clone())
    };
    let exporter = builder.build()?;

    let batch_size = cfg.get_u64(
        "telemetry.otlp.trace.batch.size",
        cfg.get_u64("telemetry.otlp.trace.export.size", DEFAULT_BATCH_SIZE),
    );
    let queue_size = cfg.get_u64("telemetry.otlp.trace.queue.size", DEFAULT_QUEUE_SIZE);
    if cfg.get_bool("telemetry.otlp.trace.queue.blocking", false) {
        tracing::warn!(
            "telemetry.otlp.trace.queue.blocking is set, but the batch processor \
             drops spans on a full queue; ignoring"
        );
    }
    let batch_config = BatchConfigBuilder::default()
        .with_max_queue_size(queue_size as usize)
        .with_max_export_batch_size(batch_size as usize)
        .with_scheduled_delay(
            cfg.get_duration("telemetry.otlp.trace.batch.timeout", DEFAULT_BATCH_TIMEOUT),
        )
        .with_max_export_timeout(
            cfg.get_duration("telemetry.otlp.trace.export.timeout", DEFAULT_EXPORT_TIMEOUT),
        )
        .build();
    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(batch_config)
        .build();

    let provider_builder = TracerProvider::builder()
        .with_span_processor(processor)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);
    let provider = match sampler_from_config(cfg)? {
        SamplerChoice::Sdk(sampler) => provider_builder.with_sampler(sampler),
        SamplerChoice::Parent(selector) => provider_builder.with_sampler(selector),
    }
    .build();

    tracing::info!(endpoint = %endpoint, "OTLP tracer provider initialized");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfig;
    use serde_json::json;

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let cfg = JsonConfig::new(json!({ "telemetry": { "otlp": { "insecure": true } } }));
        let result = build_tracer_provider(&cfg, Resource::empty());
        assert!(matches!(
            result,
            Err(TelemetryError::MissingConfig("telemetry.otlp.endpoint"))
        ));
    }

    #[test]
    fn test_legacy_endpoint_key_accepted() {
        let cfg = JsonConfig::new(json!({
            "telemetry": { "oltp": { "endpoint": "http://collector:4317" } }
        }));
        assert_eq!(
            endpoint_from_config(&cfg).expect("legacy key"),
            "http://collector:4317"
        );
    }

    #[test]
    fn test_normalize_endpoint_scheme() {
        assert_eq!(
            normalize_endpoint("collector:4317", true),
            "http://collector:4317"
        );
        assert_eq!(
            normalize_endpoint("collector:4317", false),
            "https://collector:4317"
        );
        assert_eq!(
            normalize_endpoint("http://collector:4317", false),
            "http://collector:4317"
        );
    }

    #[test]
    fn test_metadata_from_headers() {
        let cfg = JsonConfig::new(json!({
            "telemetry": { "otlp": { "headers": { "X-Api-Key": "secret" } } }
        }));
        let metadata = metadata_from_headers(&cfg).expect("valid headers");
        assert_eq!(
            metadata.get("x-api-key").and_then(|v| v.to_str().ok()),
            Some("secret")
        );
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let cfg = JsonConfig::new(json!({
            "telemetry": { "otlp": { "headers": { "x-bad": "line\nbreak" } } }
        }));
        assert!(matches!(
            metadata_from_headers(&cfg),
            Err(TelemetryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_retry_config_defaults() {
        let cfg = JsonConfig::new(json!({}));
        let retry = RetryConfig::from_config(&cfg);
        assert!(retry.enabled);
        assert_eq!(retry.initial_interval, Duration::from_secs(5));
        assert_eq!(retry.max_elapsed_time, Duration::from_secs(60));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_provider_builds_from_full_config() {
        let cfg = JsonConfig::new(json!({
            "telemetry": { "otlp": {
                "endpoint": "http://localhost:4317",
                "insecure": true,
                "compress": true,
                "timeout": "5s",
                "reconnect": "2s",
                "headers": { "x-api-key": "secret" },
                "retry": { "enable": false },
                "trace": {
                    "batch": { "size": 128, "timeout": "1s" },
                    "queue": { "size": 256 },
                    "export": { "timeout": "10s" },
                    "sample": { "name": "parent", "based": "ratio", "ratio": 0.25 }
                }
            }}
        }));
        let provider = build_tracer_provider(&cfg, Resource::empty());
        assert!(provider.is_ok());
    }
}
