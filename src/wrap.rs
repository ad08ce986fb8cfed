//! Span-wrapping combinators.
//!
//! One generic "instrument a callable" family instead of per-arity wrapper
//! functions: closures and generics cover every signature. Each combinator:
//!
//! 1. fetches the [`Telemetry`] facade from the ambient context (lazily
//!    creating one on the default scope when absent),
//! 2. starts a span, named explicitly or by caller location,
//! 3. invokes the callback with the span's context,
//! 4. reports failures and panics to the span,
//! 5. ends the span exactly once on every path.
//!
//! Panic handling depends on the signature: the fallible combinators convert
//! the recovered payload into the callback's error type through
//! [`PanicError`]; the infallible ones report it and re-raise the original
//! payload.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use futures::FutureExt;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;

use crate::error::PanicError;
use crate::telemetry::Telemetry;

/// Run `f` inside a span.
///
/// A panic in `f` is recorded on the span and re-raised with its original
/// payload.
#[track_caller]
pub fn in_span<F, T>(cx: &Context, name: &str, f: F) -> T
where
    F: FnOnce(&Context) -> T,
{
    let telemetry = Telemetry::from_context_or_default(cx);
    let span_cx = telemetry.start_span(name, cx);
    match catch_unwind(AssertUnwindSafe(|| f(&span_cx))) {
        Ok(value) => {
            span_cx.span().end();
            value
        }
        Err(payload) => {
            let err = PanicError::describe(payload.as_ref());
            telemetry.record_error(&span_cx, &err);
            span_cx.span().end();
            resume_unwind(payload);
        }
    }
}

/// Run a fallible `f` inside a span.
///
/// An `Err` return is recorded on the span before being passed through. A
/// panic is recorded and converted into the callback's error type; an `Ok`
/// return touches no error reporting at all.
#[track_caller]
pub fn try_in_span<F, T, E>(cx: &Context, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce(&Context) -> Result<T, E>,
    E: std::error::Error + From<PanicError>,
{
    let telemetry = Telemetry::from_context_or_default(cx);
    let span_cx = telemetry.start_span(name, cx);
    match catch_unwind(AssertUnwindSafe(|| f(&span_cx))) {
        Ok(Ok(value)) => {
            span_cx.span().end();
            Ok(value)
        }
        Ok(Err(err)) => {
            telemetry.record_error(&span_cx, &err);
            span_cx.span().end();
            Err(err)
        }
        Err(payload) => {
            let err = PanicError::from_panic(payload);
            telemetry.record_error(&span_cx, &err);
            span_cx.span().end();
            Err(E::from(err))
        }
    }
}

/// Run an async `f` inside a span.
///
/// The span starts when the combinator is called, not at first poll. A panic
/// in `f` (or in the future it returns) is recorded on the span and re-raised
/// with its original payload.
#[track_caller]
pub fn in_span_async<F, Fut, T>(
    cx: &Context,
    name: &str,
    f: F,
) -> impl std::future::Future<Output = T>
where
    F: FnOnce(Context) -> Fut,
    Fut: std::future::Future<Output = T>,
{
    // Span setup stays synchronous so the caller-location name fallback
    // points at the instrumented call site.
    let telemetry = Telemetry::from_context_or_default(cx);
    let span_cx = telemetry.start_span(name, cx);
    async move {
        let result = {
            let callback_cx = span_cx.clone();
            AssertUnwindSafe(async move { f(callback_cx).await })
                .catch_unwind()
                .await
        };
        match result {
            Ok(value) => {
                span_cx.span().end();
                value
            }
            Err(payload) => {
                let err = PanicError::describe(payload.as_ref());
                telemetry.record_error(&span_cx, &err);
                span_cx.span().end();
                resume_unwind(payload);
            }
        }
    }
}

/// Run a fallible async `f` inside a span.
///
/// The span starts when the combinator is called, not at first poll. Failure
/// semantics match [`try_in_span`].
#[track_caller]
pub fn try_in_span_async<F, Fut, T, E>(
    cx: &Context,
    name: &str,
    f: F,
) -> impl std::future::Future<Output = Result<T, E>>
where
    F: FnOnce(Context) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::error::Error + From<PanicError>,
{
    let telemetry = Telemetry::from_context_or_default(cx);
    let span_cx = telemetry.start_span(name, cx);
    async move {
        let result = {
            let callback_cx = span_cx.clone();
            AssertUnwindSafe(async move { f(callback_cx).await })
                .catch_unwind()
                .await
        };
        match result {
            Ok(Ok(value)) => {
                span_cx.span().end();
                Ok(value)
            }
            Ok(Err(err)) => {
                telemetry.record_error(&span_cx, &err);
                span_cx.span().end();
                Err(err)
            }
            Err(payload) => {
                let err = PanicError::from_panic(payload);
                telemetry.record_error(&span_cx, &err);
                span_cx.span().end();
                Err(E::from(err))
            }
        }
    }
}
