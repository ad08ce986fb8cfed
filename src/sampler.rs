//! Sampler selection from config.
//!
//! `telemetry.otlp.trace.sample.name` picks the policy:
//! - `always` / `never` - unconditional record or drop
//! - `ratio` - trace-ID ratio using `sample.ratio`
//! - `parent` - parent-based, rooted at the sampler named by `sample.based`
//!
//! For `parent`, `sample.options` may override individual branches
//! (`remoteSampled`, `remoteNotSampled`, `localSampled`, `localNotSampled`)
//! with `always`, `never`, or `ratio`. The SDK's built-in
//! [`Sampler::ParentBased`] only takes a root sampler, so the branch
//! overrides are a [`ShouldSample`] implementation of our own.

use opentelemetry::trace::{Link, SamplingResult, SpanKind, TraceContextExt, TraceId};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{Sampler, ShouldSample};

use crate::config::Config;
use crate::error::TelemetryError;

const SAMPLE_NAME: &str = "telemetry.otlp.trace.sample.name";
const SAMPLE_BASED: &str = "telemetry.otlp.trace.sample.based";
const SAMPLE_RATIO: &str = "telemetry.otlp.trace.sample.ratio";
const SAMPLE_OPTIONS: &str = "telemetry.otlp.trace.sample.options";

/// Parent-based sampler with per-branch delegates.
///
/// Mirrors the standard parent-based policy: the branch is chosen by whether
/// the parent span context is remote and whether it was sampled; spans
/// without a valid parent fall through to the root sampler.
#[derive(Debug, Clone)]
pub struct ParentSelector {
    root: Sampler,
    remote_sampled: Sampler,
    remote_not_sampled: Sampler,
    local_sampled: Sampler,
    local_not_sampled: Sampler,
}

impl ParentSelector {
    /// Build a selector with the standard branch defaults: honor the parent's
    /// sampling decision on both remote and local branches.
    pub fn new(root: Sampler) -> Self {
        Self {
            root,
            remote_sampled: Sampler::AlwaysOn,
            remote_not_sampled: Sampler::AlwaysOff,
            local_sampled: Sampler::AlwaysOn,
            local_not_sampled: Sampler::AlwaysOff,
        }
    }
}

impl ShouldSample for ParentSelector {
    fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
        span_kind: &SpanKind,
        attributes: &[KeyValue],
        links: &[Link],
    ) -> SamplingResult {
        let parent = parent_context
            .filter(|cx| cx.has_active_span())
            .map(|cx| cx.span().span_context().clone());

        let delegate = match parent {
            Some(ref parent) if parent.is_valid() => {
                match (parent.is_remote(), parent.is_sampled()) {
                    (true, true) => &self.remote_sampled,
                    (true, false) => &self.remote_not_sampled,
                    (false, true) => &self.local_sampled,
                    (false, false) => &self.local_not_sampled,
                }
            }
            _ => &self.root,
        };

        delegate.should_sample(parent_context, trace_id, name, span_kind, attributes, links)
    }
}

/// Sampler selected by configuration.
///
/// Kept as an enum (rather than a trait object) so the provider builder can
/// take each variant by value.
#[derive(Debug, Clone)]
pub enum SamplerChoice {
    /// One of the SDK's built-in samplers.
    Sdk(Sampler),
    /// Parent-based sampling with branch overrides.
    Parent(ParentSelector),
}

/// Translate the `telemetry.otlp.trace.sample.*` keys into a sampler.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidConfig`] for unknown sampler or branch
/// names.
pub fn sampler_from_config(cfg: &dyn Config) -> Result<SamplerChoice, TelemetryError> {
    let name = cfg
        .get_str(SAMPLE_NAME)
        .unwrap_or_else(|| "always".to_string());
    let ratio = cfg.get_f64(SAMPLE_RATIO, 1.0);

    match name.as_str() {
        "always" => Ok(SamplerChoice::Sdk(Sampler::AlwaysOn)),
        "never" => Ok(SamplerChoice::Sdk(Sampler::AlwaysOff)),
        "ratio" => Ok(SamplerChoice::Sdk(Sampler::TraceIdRatioBased(ratio))),
        "parent" => {
            let based = cfg
                .get_str(SAMPLE_BASED)
                .unwrap_or_else(|| "always".to_string());
            let root = leaf_sampler(SAMPLE_BASED, &based, ratio)?;
            let mut selector = ParentSelector::new(root);
            for (branch, value) in cfg.get_str_map(SAMPLE_OPTIONS) {
                let sampler = leaf_sampler(SAMPLE_OPTIONS, &value, ratio)?;
                match branch.as_str() {
                    "remoteSampled" => selector.remote_sampled = sampler,
                    "remoteNotSampled" => selector.remote_not_sampled = sampler,
                    "localSampled" => selector.local_sampled = sampler,
                    "localNotSampled" => selector.local_not_sampled = sampler,
                    other => {
                        return Err(TelemetryError::InvalidConfig {
                            key: SAMPLE_OPTIONS.to_string(),
                            reason: format!("unknown parent sampler branch {other:?}"),
                        })
                    }
                }
            }
            Ok(SamplerChoice::Parent(selector))
        }
        other => Err(TelemetryError::InvalidConfig {
            key: SAMPLE_NAME.to_string(),
            reason: format!("unknown sampler {other:?}, expected always|never|ratio|parent"),
        }),
    }
}

fn leaf_sampler(key: &str, name: &str, ratio: f64) -> Result<Sampler, TelemetryError> {
    match name {
        "always" => Ok(Sampler::AlwaysOn),
        "never" => Ok(Sampler::AlwaysOff),
        "ratio" => Ok(Sampler::TraceIdRatioBased(ratio)),
        other => Err(TelemetryError::InvalidConfig {
            key: key.to_string(),
            reason: format!("unknown sampler {other:?}, expected always|never|ratio"),
        }),
    }
}
