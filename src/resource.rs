//! Process-wide resource descriptor.
//!
//! Builds the OpenTelemetry [`Resource`] attached to all telemetry emitted by
//! this process. Which attribute categories are collected is controlled by
//! `telemetry.resource.*` boolean flags (all default true). The computed
//! descriptor is memoized behind a mutex: repeated calls with the same flag
//! combination reuse the cached value, and a new combination overwrites it
//! (last computed wins).

use std::fs;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use opentelemetry::{Array, KeyValue, StringValue, Value};
use opentelemetry_sdk::resource::{
    EnvResourceDetector, ResourceDetector, SdkProvidedResourceDetector, TelemetryResourceDetector,
};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource as semconv;

use crate::config::Config;

/// Bitmask of resource attribute categories to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFlags(u32);

impl ResourceFlags {
    /// Service name attribute.
    pub const SERVICE: ResourceFlags = ResourceFlags(1 << 0);
    /// Container ID attribute (from the cgroup file).
    pub const CONTAINER: ResourceFlags = ResourceFlags(1 << 1);
    /// Host name attribute.
    pub const HOST: ResourceFlags = ResourceFlags(1 << 2);
    /// Host ID attribute (from `/etc/machine-id`).
    pub const HOST_ID: ResourceFlags = ResourceFlags(1 << 3);
    /// Attributes from `OTEL_RESOURCE_ATTRIBUTES` / `OTEL_SERVICE_NAME`.
    pub const ENV: ResourceFlags = ResourceFlags(1 << 4);
    /// Process attributes (pid, executable, args).
    pub const PROCESS: ResourceFlags = ResourceFlags(1 << 5);
    /// Telemetry SDK attributes.
    pub const SDK: ResourceFlags = ResourceFlags(1 << 6);

    /// No categories.
    pub const NONE: ResourceFlags = ResourceFlags(0);

    /// Whether every category in `other` is set in `self`.
    pub fn contains(self, other: ResourceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Read the flag set from `telemetry.resource.*` config booleans.
    ///
    /// Each category defaults to enabled; flags accumulate with bitwise OR.
    pub fn from_config(cfg: &dyn Config) -> Self {
        let mut flags = ResourceFlags::NONE;
        for (key, flag) in [
            ("telemetry.resource.service", Self::SERVICE),
            ("telemetry.resource.container", Self::CONTAINER),
            ("telemetry.resource.host", Self::HOST),
            ("telemetry.resource.hostID", Self::HOST_ID),
            ("telemetry.resource.env", Self::ENV),
            ("telemetry.resource.process", Self::PROCESS),
            ("telemetry.resource.sdk", Self::SDK),
        ] {
            if cfg.get_bool(key, true) {
                flags |= flag;
            }
        }
        flags
    }
}

impl BitOr for ResourceFlags {
    type Output = ResourceFlags;

    fn bitor(self, rhs: ResourceFlags) -> ResourceFlags {
        ResourceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResourceFlags {
    fn bitor_assign(&mut self, rhs: ResourceFlags) {
        self.0 |= rhs.0;
    }
}

/// Single-entry resource cache keyed by the flag combination.
///
/// A lookup with the cached flags returns a clone without re-collecting
/// attributes; a lookup with different flags rebuilds and replaces the entry.
pub(crate) struct ResourceCache {
    entry: Mutex<Option<(ResourceFlags, Resource)>>,
}

impl ResourceCache {
    pub(crate) const fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    pub(crate) fn get_or_build<F>(&self, flags: ResourceFlags, build: F) -> Resource
    where
        F: FnOnce() -> Resource,
    {
        let mut guard = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_flags, resource)) = guard.as_ref() {
            if *cached_flags == flags {
                return resource.clone();
            }
        }
        let resource = build();
        *guard = Some((flags, resource.clone()));
        resource
    }
}

static PROCESS_RESOURCE: ResourceCache = ResourceCache::new();

/// Compute (or fetch the cached) resource descriptor for this process.
///
/// Collection failures are non-fatal: a category that cannot be read is
/// logged at debug level and skipped, degrading the descriptor rather than
/// aborting startup.
pub fn process_resource(cfg: &dyn Config, service_name: &str) -> Resource {
    let flags = ResourceFlags::from_config(cfg);
    PROCESS_RESOURCE.get_or_build(flags, || build_resource(flags, service_name))
}

/// Timeout handed to the SDK resource detectors.
const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_resource(flags: ResourceFlags, service_name: &str) -> Resource {
    let mut detectors: Vec<Box<dyn ResourceDetector>> = Vec::new();
    if flags.contains(ResourceFlags::SDK) {
        detectors.push(Box::new(TelemetryResourceDetector));
        detectors.push(Box::new(SdkProvidedResourceDetector));
    }
    if flags.contains(ResourceFlags::ENV) {
        detectors.push(Box::new(EnvResourceDetector::new()));
    }
    let detected = if detectors.is_empty() {
        Resource::empty()
    } else {
        Resource::from_detectors(DETECT_TIMEOUT, detectors)
    };

    let mut attrs = Vec::new();
    if flags.contains(ResourceFlags::SERVICE) {
        attrs.push(KeyValue::new(semconv::SERVICE_NAME, service_name.to_string()));
    }
    if flags.contains(ResourceFlags::HOST) {
        match host_name() {
            Some(name) => attrs.push(KeyValue::new(semconv::HOST_NAME, name)),
            None => tracing::debug!("Host name unavailable, skipping host.name attribute"),
        }
    }
    if flags.contains(ResourceFlags::HOST_ID) {
        match host_id() {
            Some(id) => attrs.push(KeyValue::new(semconv::HOST_ID, id)),
            None => tracing::debug!("Machine ID unavailable, skipping host.id attribute"),
        }
    }
    if flags.contains(ResourceFlags::CONTAINER) {
        match container_id() {
            Some(id) => attrs.push(KeyValue::new(semconv::CONTAINER_ID, id)),
            None => tracing::debug!("No container ID found, skipping container.id attribute"),
        }
    }
    if flags.contains(ResourceFlags::PROCESS) {
        attrs.extend(process_attributes());
    }

    // Explicit attributes win over detector-provided ones on key conflicts.
    detected.merge(&Resource::new(attrs))
}

fn process_attributes() -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new(semconv::PROCESS_PID, i64::from(std::process::id())),
        KeyValue::new(semconv::PROCESS_RUNTIME_NAME, "rustc"),
    ];
    if let Ok(exe) = std::env::current_exe() {
        attrs.push(KeyValue::new(
            semconv::PROCESS_EXECUTABLE_PATH,
            exe.display().to_string(),
        ));
        if let Some(name) = exe.file_name().and_then(|n| n.to_str()) {
            attrs.push(KeyValue::new(
                semconv::PROCESS_EXECUTABLE_NAME,
                name.to_string(),
            ));
        }
    }
    let args: Vec<StringValue> = std::env::args().map(StringValue::from).collect();
    attrs.push(KeyValue::new(
        semconv::PROCESS_COMMAND_ARGS,
        Value::Array(Array::String(args)),
    ));
    attrs
}

fn host_name() -> Option<String> {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return Some(name.trim().to_string());
        }
    }
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(contents) = fs::read_to_string(path) {
            let name = contents.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn host_id() -> Option<String> {
    let contents = fs::read_to_string("/etc/machine-id").ok()?;
    let id = contents.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn container_id() -> Option<String> {
    let contents = fs::read_to_string("/proc/self/cgroup").ok()?;
    container_id_from_cgroup(&contents)
}

/// Extract a container ID from `/proc/self/cgroup` contents.
///
/// Each line has the form `hierarchy:controllers:path`. The container ID, if
/// present, is the last path segment: a 64-character hex string, possibly
/// wrapped as `docker-<id>.scope` under systemd cgroup drivers.
fn container_id_from_cgroup(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let path = line.splitn(3, ':').nth(2)?;
        let segment = path.rsplit('/').find(|s| !s.is_empty())?;
        let segment = segment.strip_suffix(".scope").unwrap_or(segment);
        let candidate = segment.rsplit('-').next().unwrap_or(segment);
        if candidate.len() == 64 && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(candidate.to_string());
        }
    }
    None
}
