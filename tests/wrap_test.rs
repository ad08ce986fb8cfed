//! Span-wrapping combinator behavior: error reporting, panic conversion, and
//! span lifecycle.

mod common;

use common::recording_telemetry;
use flare::error::PanicError;
use flare::wrap::{in_span, in_span_async, try_in_span, try_in_span_async};
use opentelemetry::trace::Status;
use opentelemetry::Context;
use thiserror::Error;

#[derive(Debug, Error)]
enum TestError {
    #[error("operation failed")]
    Boom,
    #[error(transparent)]
    Panic(#[from] PanicError),
}

#[test]
fn normal_return_reports_no_error() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let value = in_span(&cx, "normal", |_| 41 + 1);
    assert_eq!(value, 42);

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "normal");
    assert_eq!(spans[0].status, Status::Unset);
    assert!(spans[0].events.events.is_empty());
}

#[test]
fn ok_result_reports_no_error() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let result: Result<u32, TestError> = try_in_span(&cx, "ok", |_| Ok(7));
    assert_eq!(result.expect("callback succeeded"), 7);

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, Status::Unset);
    assert!(spans[0].events.events.is_empty());
}

#[test]
fn err_result_is_recorded_and_passed_through() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let result: Result<u32, TestError> = try_in_span(&cx, "fails", |_| Err(TestError::Boom));
    assert!(matches!(result, Err(TestError::Boom)));

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    match &spans[0].status {
        Status::Error { description } => assert_eq!(description.as_ref(), "operation failed"),
        other => panic!("expected error status, got {other:?}"),
    }
    assert!(spans[0]
        .events
        .events
        .iter()
        .any(|event| event.name == "exception"));
}

#[test]
fn panic_converts_to_error_with_same_message() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let result: Result<u32, TestError> = try_in_span(&cx, "panics", |_| panic!("kaboom"));
    let err = result.expect_err("panic converted");
    assert_eq!(err.to_string(), "kaboom");
    assert!(matches!(err, TestError::Panic(PanicError::Message(_))));

    // The span was ended exactly once despite the panic.
    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    match &spans[0].status {
        Status::Error { description } => assert_eq!(description.as_ref(), "kaboom"),
        other => panic!("expected error status, got {other:?}"),
    }
}

#[test]
fn infallible_panic_is_reraised_with_original_payload() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        in_span(&cx, "reraise", |_| -> u32 { panic!("original payload") })
    }));
    let payload = outcome.expect_err("panic propagated");
    assert_eq!(
        payload.downcast_ref::<&'static str>().copied(),
        Some("original payload")
    );

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    match &spans[0].status {
        Status::Error { description } => assert_eq!(description.as_ref(), "original payload"),
        other => panic!("expected error status, got {other:?}"),
    }
}

#[test]
fn empty_name_falls_back_to_caller_location() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    in_span(&cx, "", |_| ());

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    assert!(
        spans[0].name.contains("wrap_test.rs"),
        "span name {:?} should carry the call site",
        spans[0].name
    );
}

#[tokio::test]
async fn async_empty_name_falls_back_to_caller_location() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    in_span_async(&cx, "", |_| async {}).await;

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    assert!(
        spans[0].name.contains("wrap_test.rs"),
        "span name {:?} should carry the call site",
        spans[0].name
    );
}

#[tokio::test]
async fn async_normal_return_reports_no_error() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let value = in_span_async(&cx, "async-normal", |_| async { 6 * 7 }).await;
    assert_eq!(value, 42);

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, Status::Unset);
}

#[tokio::test]
async fn async_panic_converts_to_error() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    let result: Result<u32, TestError> =
        try_in_span_async(&cx, "async-panics", |_| async { panic!("async kaboom") }).await;
    let err = result.expect_err("panic converted");
    assert_eq!(err.to_string(), "async kaboom");

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 1);
}

#[test]
fn nested_spans_share_the_trace() {
    let (telemetry, exporter, _provider) = recording_telemetry();
    let cx = telemetry.attach(&Context::new());

    in_span(&cx, "outer", |outer_cx| {
        in_span(outer_cx, "inner", |_| ());
    });

    let spans = exporter.get_finished_spans().expect("spans exported");
    assert_eq!(spans.len(), 2);
    let trace_ids: Vec<_> = spans
        .iter()
        .map(|span| span.span_context.trace_id())
        .collect();
    assert_eq!(trace_ids[0], trace_ids[1]);
}
