//! Flare: a convenience layer over the OpenTelemetry SDK.
//!
//! Flare wires config into telemetry: it builds an OTLP trace exporter and a
//! Prometheus metrics exporter from a nested key-value config source, derives
//! a process resource descriptor, and wraps arbitrary callbacks in spans.
//! The hard parts (batching, sampling, export, wire encoding) stay in the
//! SDK; this crate only translates configuration and instruments call sites.
//!
//! # Modules
//!
//! - [`config`]: path-based typed config accessors
//! - [`error`]: setup/shutdown errors and panic-to-error conversion
//! - [`logging`]: tracing subscriber setup
//! - [`metrics`]: Prometheus-backed meter provider
//! - [`resource`]: process resource descriptor (memoized)
//! - [`sampler`]: sampler selection, including branch-level parent options
//! - [`shutdown`]: aggregated, idempotent provider shutdown
//! - [`telemetry`]: the context-carried `Telemetry` facade
//! - [`trace`]: OTLP tracer provider construction
//! - [`wrap`]: generic span-wrapping combinators
//!
//! # Quick start
//!
//! ```no_run
//! use flare::config::JsonConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = JsonConfig::from_str(
//!     r#"{ "telemetry": { "otlp": { "endpoint": "http://localhost:4317" } } }"#,
//! )?;
//! let providers = flare::init(&cfg, "my-service")?;
//! // ... run ...
//! providers.shutdown.shutdown()?;
//! # Ok(())
//! # }
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // config::JsonConfig is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resource;
pub mod sampler;
pub mod shutdown;
pub mod telemetry;
pub mod trace;
pub mod wrap;

use opentelemetry::global;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;

use crate::config::Config;
use crate::error::TelemetryError;
use crate::shutdown::Shutdown;

/// The providers built by [`init`], plus their aggregated shutdown.
pub struct Providers {
    /// Tracer provider exporting to the configured OTLP collector.
    pub tracer_provider: opentelemetry_sdk::trace::TracerProvider,
    /// Meter provider reading into the Prometheus registry.
    pub meter_provider: SdkMeterProvider,
    /// Registry to serve from a metrics scrape endpoint.
    pub registry: prometheus::Registry,
    /// Aggregated shutdown for both providers.
    pub shutdown: Shutdown,
}

/// Build and globally install the telemetry providers.
///
/// Derives the process resource, builds the OTLP tracer provider and the
/// Prometheus meter provider, installs them (and a W3C trace-context
/// propagator) as the process globals, and registers their shutdown hooks.
///
/// Resource collection failures degrade the descriptor without failing; a
/// missing OTLP endpoint is fatal.
///
/// # Errors
///
/// Returns an error when required config is missing or a provider cannot be
/// built. Must be called within a Tokio runtime.
pub fn init(cfg: &dyn Config, service_name: &str) -> Result<Providers, TelemetryError> {
    let resource = resource::process_resource(cfg, service_name);

    let tracer_provider = trace::build_tracer_provider(cfg, resource.clone())?;
    global::set_tracer_provider(tracer_provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    let registry = prometheus::Registry::new();
    let meter_provider = metrics::build_meter_provider(&registry, resource)?;
    global::set_meter_provider(meter_provider.clone());

    let shutdown = Shutdown::new();
    {
        let provider = tracer_provider.clone();
        shutdown.register("tracer-provider", move || {
            provider.shutdown()?;
            Ok(())
        });
    }
    {
        let provider = meter_provider.clone();
        shutdown.register("meter-provider", move || {
            provider.shutdown()?;
            Ok(())
        });
    }

    Ok(Providers {
        tracer_provider,
        meter_provider,
        registry,
        shutdown,
    })
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("tracer_provider", &self.tracer_provider)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
