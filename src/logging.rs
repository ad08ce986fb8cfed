//! Tracing subscriber setup.
//!
//! Configures structured logging with:
//! - Environment-based filter (via RUST_LOG)
//! - Optional OpenTelemetry layer bridging `tracing` spans into the OTLP
//!   pipeline

use opentelemetry::trace::TracerProvider as _;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// When a tracer provider is given, `tracing` spans are exported through it
/// in addition to the console output.
///
/// # Arguments
///
/// * `service_name` - Name of the service, logged at startup
/// * `tracer_provider` - Provider for OTLP span export, if configured
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(
    service_name: &str,
    tracer_provider: Option<&opentelemetry_sdk::trace::TracerProvider>,
) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flare=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let otel_layer = tracer_provider
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer("flare")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    tracing::info!(service = service_name, "Tracing initialized");
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
