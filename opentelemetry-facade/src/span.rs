use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::time::SystemTime;

use opentelemetry::trace::noop::NoopTracer;
use opentelemetry::trace::{SpanBuilder, Status, TraceContextExt, Tracer};
use opentelemetry::{Array, Context, Key, KeyValue, StringValue, Value};

use crate::init::{handle, TracerHandle};

/// Begin a new span as a child of whatever span `parent` carries.
///
/// Returns the updated context holding the new span together with the span
/// handle itself. Uses the process-wide tracer when [`init`] has run and a
/// discarding tracer otherwise, so instrumented code never branches on
/// whether tracing is enabled.
///
/// [`init`]: crate::init
pub fn start_span(parent: &Context, name: impl Into<Cow<'static, str>>) -> (Context, Span) {
    start_span_with(parent, SpanBuilder::from_name(name))
}

/// Like [`start_span`], taking a preconfigured [`SpanBuilder`] for span-start
/// options (kind, explicit timestamps, initial attributes, links).
pub fn start_span_with(parent: &Context, builder: SpanBuilder) -> (Context, Span) {
    let cx = match handle() {
        Some(TracerHandle::Real(tracer)) => attach(tracer, builder, parent),
        Some(TracerHandle::Noop(tracer)) => attach(tracer, builder, parent),
        None => attach(&NoopTracer::new(), builder, parent),
    };
    (cx.clone(), Span { cx })
}

fn attach<T>(tracer: &T, builder: SpanBuilder, parent: &Context) -> Context
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    parent.with_span(tracer.build_with_context(builder, parent))
}

/// Extract the currently active span from a context.
///
/// Yields an invalid, non-recording span when the context carries none;
/// every operation on it is inert.
pub fn span_from_context(cx: &Context) -> Span {
    Span { cx: cx.clone() }
}

/// Run `f` inside a new span and complete the span from the closure's result.
///
/// The scoped form of [`Span::end_with_result`]: the span is finalized on
/// every exit path with whatever error the closure produced, and the result
/// is passed through unchanged.
pub fn in_span<T, E, F>(parent: &Context, name: impl Into<Cow<'static, str>>, f: F) -> Result<T, E>
where
    F: FnOnce(Context) -> Result<T, E>,
    E: StdError + 'static,
{
    let (cx, span) = start_span(parent, name);
    let result = f(cx);
    span.end_with_result(&result);
    result
}

/// Marker error signalling cooperative cancellation of an operation.
///
/// Errors carrying this marker anywhere in their `source()` chain are
/// treated like a gRPC `Cancelled` status on completion: the span records a
/// `"canceled"` event instead of an error status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("operation canceled")]
pub struct Canceled;

/// One unit of traced work.
///
/// Wraps the span held by a [`Context`] and must be completed exactly once
/// through one of the `end` methods, which consume the handle. Dropping a
/// `Span` without ending it leaves completion to the underlying tracer.
#[derive(Debug)]
pub struct Span {
    cx: Context,
}

impl Span {
    /// The context carrying this span.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Attach a typed attribute to the span.
    ///
    /// Accepts every kind [`TagValue`] converts from; values without a
    /// conversion cannot be expressed, which keeps call sites non-fallible.
    pub fn tag(&self, key: impl Into<Key>, value: impl Into<TagValue>) {
        self.cx
            .span()
            .set_attribute(KeyValue::new(key.into(), Value::from(value.into())));
    }

    /// Whether the span context carries a valid trace id and span id.
    pub fn is_valid(&self) -> bool {
        self.cx.span().span_context().is_valid()
    }

    /// Whether the sampling bit is set in the span's trace flags.
    pub fn is_sampled(&self) -> bool {
        self.cx.span().span_context().is_sampled()
    }

    /// The span id as a hex string.
    pub fn span_id(&self) -> String {
        self.cx.span().span_context().span_id().to_string()
    }

    /// The trace id as a hex string.
    pub fn trace_id(&self) -> String {
        self.cx.span().span_context().trace_id().to_string()
    }

    /// Set the span status.
    ///
    /// Statuses form a total order `Ok > Error > Unset`; the underlying span
    /// ignores any call that would lower an already-set status.
    pub fn set_status(&self, status: Status) {
        self.cx.span().set_status(status);
    }

    /// Append a timestamped event to the span's event log. Does not affect
    /// status.
    pub fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name, attributes);
    }

    /// [`Self::add_event`] with an explicit timestamp.
    pub fn add_event_with_timestamp(
        &self,
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        self.cx
            .span()
            .add_event_with_timestamp(name, timestamp, attributes);
    }

    /// Record `err` as an exception event on the span.
    ///
    /// The span status is not changed; call [`Self::set_status`] separately
    /// if the error should also mark the span failed. Does nothing when the
    /// span is not recording.
    pub fn record_error(&self, err: &dyn StdError) {
        self.cx.span().record_error(err);
    }

    /// Complete the span, leaving any previously set status in place.
    pub fn end(self) {
        self.finish(None);
    }

    /// Complete the span, deriving the final status from the first present
    /// error among `errs`.
    ///
    /// Candidates are scanned in order and the first `Some` decides the
    /// outcome: a cancellation (a [`Canceled`] marker or a gRPC `Cancelled`
    /// status anywhere in the `source()` chain) records a `"canceled"` event
    /// and sets no error status; any other error sets `Status::Error` with
    /// the error's text. With no error present, a status set earlier via
    /// [`Self::set_status`] stands. The span is finalized in every case.
    ///
    /// The slice of optional errors lets an operation register several
    /// error slots up front and complete the span after the last of them has
    /// been decided; [`in_span`] packages the common single-result case.
    pub fn end_with(self, errs: &[Option<&(dyn StdError + 'static)>]) {
        self.finish(errs.iter().copied().flatten().next());
    }

    /// Complete the span from an operation's result, per the rules of
    /// [`Self::end_with`].
    pub fn end_with_result<T, E>(self, result: &Result<T, E>)
    where
        E: StdError + 'static,
    {
        self.finish(
            result
                .as_ref()
                .err()
                .map(|err| err as &(dyn StdError + 'static)),
        );
    }

    fn finish(self, err: Option<&(dyn StdError + 'static)>) {
        let span = self.cx.span();
        if let Some(err) = err {
            if is_cancellation(err) {
                span.add_event("canceled", Vec::new());
            } else {
                span.set_status(Status::error(err.to_string()));
            }
        }
        span.end();
    }
}

/// Whether `err` represents cancellation rather than failure, walking the
/// source chain the way `errors.Is`-style matching does.
fn is_cancellation(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<Canceled>() {
            return true;
        }
        if let Some(status) = err.downcast_ref::<tonic::Status>() {
            if status.code() == tonic::Code::Cancelled {
                return true;
            }
        }
        current = err.source();
    }
    false
}

/// A span attribute value of one of the supported kinds.
///
/// The closed set of variants mirrors what the exporter can represent:
/// booleans, 64-bit integers, doubles, strings and homogeneous sequences of
/// strings or integers. Conversions exist for the usual host types; anything
/// else goes through [`TagValue::display`].
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// A boolean attribute.
    Bool(bool),
    /// A signed integer attribute.
    I64(i64),
    /// A double-precision float attribute.
    F64(f64),
    /// A string attribute.
    String(StringValue),
    /// A sequence-of-strings attribute.
    StringSlice(Vec<StringValue>),
    /// A sequence-of-integers attribute.
    I64Slice(Vec<i64>),
}

impl TagValue {
    /// Build a string attribute from any value with a textual representation.
    pub fn display(value: impl fmt::Display) -> Self {
        TagValue::String(value.to_string().into())
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        TagValue::I64(value.into())
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::I64(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::F64(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_string().into())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value.into())
    }
}

impl From<StringValue> for TagValue {
    fn from(value: StringValue) -> Self {
        TagValue::String(value)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(values: Vec<String>) -> Self {
        TagValue::StringSlice(values.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<&str>> for TagValue {
    fn from(values: Vec<&str>) -> Self {
        TagValue::StringSlice(values.iter().map(|value| value.to_string().into()).collect())
    }
}

impl From<Vec<i64>> for TagValue {
    fn from(values: Vec<i64>) -> Self {
        TagValue::I64Slice(values)
    }
}

impl From<Vec<i32>> for TagValue {
    fn from(values: Vec<i32>) -> Self {
        TagValue::I64Slice(values.into_iter().map(Into::into).collect())
    }
}

impl From<TagValue> for Value {
    fn from(value: TagValue) -> Self {
        match value {
            TagValue::Bool(value) => Value::Bool(value),
            TagValue::I64(value) => Value::I64(value),
            TagValue::F64(value) => Value::F64(value),
            TagValue::String(value) => Value::String(value),
            TagValue::StringSlice(values) => Value::Array(Array::String(values)),
            TagValue::I64Slice(values) => Value::Array(Array::I64(values)),
        }
    }
}
