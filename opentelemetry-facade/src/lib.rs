//! Minimal span facade and OTLP bootstrap for OpenTelemetry tracing.
//!
//! This crate wires the [OpenTelemetry] stack up for the common service case
//! — one process-wide tracer shipping batched spans to an OTLP collector
//! over gRPC — and puts a small span surface in front of it so instrumented
//! code never handles tracing errors or branches on whether tracing is
//! enabled.
//!
//! [`init`] installs the tracer once per process and returns a [`Shutdown`]
//! handle that flushes and tears the pipeline down. [`start_span`] and
//! [`span_from_context`] work before `init`, after it, and in noop mode
//! alike; spans started without a tracer are valid objects that record
//! nothing.
//!
//! On completion, [`Span::end_with`] derives the final status from the
//! errors an operation produced: cancellations become a `"canceled"` event
//! rather than an error status, so expected aborts stay out of error-rate
//! dashboards.
//!
//! ```no_run
//! use opentelemetry_facade::{init, start_span, Context, TracerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracer = init("checkout", "1.4.2", TracerConfig::new())?;
//!
//!     let (cx, span) = start_span(&Context::current(), "charge");
//!     span.tag("order.id", 4217i64);
//!     let result = charge(&cx);
//!     span.end_with_result(&result);
//!
//!     tracer.shutdown()?;
//!     result.map_err(Into::into)
//! }
//!
//! fn charge(_cx: &opentelemetry_facade::Context) -> std::io::Result<()> {
//!     Ok(())
//! }
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod config;
mod error;
mod init;
mod span;

pub use config::TracerConfig;
pub use error::Error;
pub use init::{init, Shutdown};
pub use span::{
    in_span, span_from_context, start_span, start_span_with, Canceled, Span, TagValue,
};

// Pass-through types from the wrapped runtime, re-exported so callers of the
// facade don't need a direct `opentelemetry` dependency for the basics.
pub use opentelemetry::trace::{SpanBuilder, SpanKind, Status};
pub use opentelemetry::{Context, Key, KeyValue, Value};
