//! The `Telemetry` facade.
//!
//! Bundles a tracer, a meter, and default span-start options for one logical
//! operation scope. Immutable after construction; cheap to share via `Arc`.
//!
//! A facade can travel with an [`opentelemetry::Context`]: [`Telemetry::attach`]
//! stores it as a typed context value (the key identity is the `Telemetry`
//! type itself, there is no ambient global registry), and the wrap combinators
//! in [`crate::wrap`] fetch it back out or fall back to the global providers.

use std::borrow::Cow;
use std::sync::Arc;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::metrics::Meter;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{Context, InstrumentationScope, KeyValue};

/// Scope name used when no facade was attached to the context.
pub const DEFAULT_SCOPE: &str = "flare";

/// Typed context key for a carried facade.
#[derive(Clone)]
struct TelemetryHolder(Arc<Telemetry>);

/// Meter on the global provider for a possibly non-static scope name.
///
/// `global::meter` only takes `&'static str`; going through an
/// [`InstrumentationScope`] accepts the owned names this facade carries.
fn global_meter(scope: Cow<'static, str>) -> Meter {
    global::meter_with_scope(InstrumentationScope::builder(scope).build())
}

/// Tracer + meter + default span-start options for one instrumentation scope.
pub struct Telemetry {
    scope: Cow<'static, str>,
    tracer: BoxedTracer,
    meter: Meter,
    span_kind: SpanKind,
    attributes: Vec<KeyValue>,
}

impl Telemetry {
    /// Create a facade backed by the globally installed providers.
    pub fn new(scope: impl Into<Cow<'static, str>>) -> Self {
        let scope = scope.into();
        Self {
            tracer: global::tracer(scope.clone()),
            meter: global_meter(scope.clone()),
            scope,
            span_kind: SpanKind::Internal,
            attributes: Vec::new(),
        }
    }

    /// Create a facade backed by an explicit tracer provider.
    ///
    /// The metrics side still comes from the global meter provider.
    pub fn from_provider<P>(provider: &P, scope: impl Into<Cow<'static, str>>) -> Self
    where
        P: TracerProvider,
        P::Tracer: Send + Sync + 'static,
        <P::Tracer as Tracer>::Span: Send + Sync + 'static,
    {
        let scope = scope.into();
        Self {
            tracer: BoxedTracer::new(Box::new(provider.tracer(scope.clone()))),
            meter: global_meter(scope.clone()),
            scope,
            span_kind: SpanKind::Internal,
            attributes: Vec::new(),
        }
    }

    /// Set the default span kind for spans started through this facade.
    pub fn with_span_kind(mut self, kind: SpanKind) -> Self {
        self.span_kind = kind;
        self
    }

    /// Set attributes added to every span started through this facade.
    pub fn with_attributes(mut self, attributes: Vec<KeyValue>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Instrumentation scope name.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Meter for this scope.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Attach this facade to a context so downstream wrappers can find it.
    pub fn attach(self: Arc<Self>, cx: &Context) -> Context {
        cx.with_value(TelemetryHolder(self))
    }

    /// Fetch the facade carried by a context, if any.
    pub fn from_context(cx: &Context) -> Option<Arc<Telemetry>> {
        cx.get::<TelemetryHolder>().map(|holder| holder.0.clone())
    }

    /// Fetch the carried facade, or lazily create one on the default scope.
    pub fn from_context_or_default(cx: &Context) -> Arc<Telemetry> {
        Self::from_context(cx).unwrap_or_else(|| Arc::new(Telemetry::new(DEFAULT_SCOPE)))
    }

    /// Start a span and return a context with it installed.
    ///
    /// An empty `name` falls back to the caller's source location, so
    /// instrumented call sites without an explicit operation name still get a
    /// distinguishable span.
    #[track_caller]
    pub fn start_span(&self, name: &str, cx: &Context) -> Context {
        let span_name: Cow<'static, str> = if name.is_empty() {
            let location = std::panic::Location::caller();
            format!("{}:{}", location.file(), location.line()).into()
        } else {
            name.to_string().into()
        };
        let mut builder = self
            .tracer
            .span_builder(span_name)
            .with_kind(self.span_kind.clone());
        if !self.attributes.is_empty() {
            builder = builder.with_attributes(self.attributes.clone());
        }
        let span = builder.start_with_context(&self.tracer, cx);
        cx.with_span(span)
    }

    /// Record an error on the span carried by `cx` and mark it failed.
    pub fn record_error(&self, cx: &Context, err: &dyn std::error::Error) {
        let span = cx.span();
        span.record_error(err);
        span.set_status(Status::error(err.to_string()));
    }

    /// End the span carried by `cx`.
    pub fn end_span(&self, cx: &Context) {
        cx.span().end();
    }

    /// Inject the trace context of `cx` into a carrier (headers map) using
    /// the globally installed propagator.
    pub fn inject(&self, cx: &Context, carrier: &mut dyn Injector) {
        global::get_text_map_propagator(|propagator| propagator.inject_context(cx, carrier));
    }

    /// Extract a trace context from a carrier using the globally installed
    /// propagator.
    pub fn extract(&self, carrier: &dyn Extractor) -> Context {
        global::get_text_map_propagator(|propagator| propagator.extract(carrier))
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("scope", &self.scope)
            .field("span_kind", &self.span_kind)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
