//! Error types for provider construction, shutdown, and wrapped callbacks.

use thiserror::Error;

/// Error type for telemetry setup and shutdown operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A required configuration key was absent.
    #[error("Missing required config key: {0}")]
    MissingConfig(&'static str),

    /// A configuration key held a value we could not use.
    #[error("Invalid value for config key {key}: {reason}")]
    InvalidConfig {
        /// Dotted path of the offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The OTLP span exporter could not be built.
    #[error("Failed to build OTLP span exporter: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    /// The OTLP endpoint was not a valid URI for the gRPC channel.
    #[error("Invalid OTLP endpoint: {0}")]
    Endpoint(#[from] tonic::transport::Error),

    /// The Prometheus metrics exporter could not be built.
    #[error("Failed to build Prometheus metrics exporter: {0}")]
    Metrics(String),

    /// One or more registered shutdown hooks failed.
    ///
    /// The individual failures are joined here; a second `shutdown()` call
    /// does not report them again.
    #[error("Shutdown completed with errors: {}", .0.join("; "))]
    Shutdown(Vec<String>),
}

/// A panic recovered from a wrapped callback, converted to an error.
///
/// Closed set of payload kinds: an error value raised via
/// [`std::panic::panic_any`], a plain panic message, or an opaque payload we
/// cannot render.
#[derive(Debug, Error)]
pub enum PanicError {
    /// The callback panicked with an [`anyhow::Error`] payload.
    #[error(transparent)]
    Wrapped(#[from] anyhow::Error),

    /// The callback panicked with a string payload (`panic!("...")`).
    #[error("{0}")]
    Message(String),

    /// The callback panicked with a payload of some other type.
    #[error("panic with non-string payload")]
    Opaque,
}

impl PanicError {
    /// Convert an owned panic payload into a `PanicError`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        match payload.downcast::<String>() {
            Ok(message) => PanicError::Message(*message),
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => PanicError::Message((*message).to_string()),
                Err(payload) => match payload.downcast::<anyhow::Error>() {
                    Ok(err) => PanicError::Wrapped(*err),
                    Err(_) => PanicError::Opaque,
                },
            },
        }
    }

    /// Describe a borrowed panic payload without consuming it.
    ///
    /// Used on the re-raise path, where the original payload must survive for
    /// [`std::panic::resume_unwind`].
    pub fn describe(payload: &(dyn std::any::Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<String>() {
            PanicError::Message(message.clone())
        } else if let Some(message) = payload.downcast_ref::<&'static str>() {
            PanicError::Message((*message).to_string())
        } else if let Some(err) = payload.downcast_ref::<anyhow::Error>() {
            PanicError::Message(err.to_string())
        } else {
            PanicError::Opaque
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_panic_string_payload() {
        let err = PanicError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "boom");

        let err = PanicError::from_panic(Box::new(String::from("kaput")));
        assert_eq!(err.to_string(), "kaput");
    }

    #[test]
    fn test_from_panic_error_payload() {
        let err = PanicError::from_panic(Box::new(anyhow::anyhow!("bad state")));
        assert!(matches!(err, PanicError::Wrapped(_)));
        assert_eq!(err.to_string(), "bad state");
    }

    #[test]
    fn test_from_panic_opaque_payload() {
        let err = PanicError::from_panic(Box::new(42_u32));
        assert!(matches!(err, PanicError::Opaque));
    }

    #[test]
    fn test_describe_does_not_consume() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("still here"));
        let err = PanicError::describe(payload.as_ref());
        assert_eq!(err.to_string(), "still here");
        // Payload is still intact for resume_unwind.
        assert!(payload.downcast_ref::<String>().is_some());
    }

    #[test]
    fn test_shutdown_error_joins_messages() {
        let err = TelemetryError::Shutdown(vec!["a: x".into(), "b: y".into()]);
        assert_eq!(err.to_string(), "Shutdown completed with errors: a: x; b: y");
    }
}
