//! Aggregated, idempotent telemetry shutdown.

use std::sync::{Mutex, PoisonError};

use crate::error::TelemetryError;

type ShutdownFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Collects provider shutdown hooks and runs them all exactly once.
///
/// Hooks registered after a `shutdown()` call run on the next call; a call
/// with nothing pending is a no-op, so invoking `shutdown()` twice neither
/// re-runs hooks nor re-reports errors already joined by the first call.
#[derive(Default)]
pub struct Shutdown {
    hooks: Mutex<Vec<(String, ShutdownFn)>>,
}

impl Shutdown {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named shutdown hook.
    pub fn register<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), Box::new(hook)));
    }

    /// Run all pending hooks, joining any failures.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Shutdown`] listing each hook that failed.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        let hooks = std::mem::take(
            &mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if hooks.is_empty() {
            return Ok(());
        }

        let mut failures = Vec::new();
        for (name, hook) in hooks {
            tracing::debug!(hook = %name, "Running telemetry shutdown hook");
            if let Err(e) = hook() {
                tracing::warn!(hook = %name, error = %e, "Telemetry shutdown hook failed");
                failures.push(format!("{name}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TelemetryError::Shutdown(failures))
        }
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Shutdown").field("pending", &pending).finish()
    }
}
