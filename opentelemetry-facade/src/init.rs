use std::sync::OnceLock;

use opentelemetry::trace::noop::NoopTracer;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, otel_debug, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithTonicConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::attribute::SERVICE_VERSION;
use tonic::transport::{Channel, Endpoint};

use crate::config::TracerConfig;
use crate::error::Error;

/// The process-wide tracer. Written exactly once by [`init`], read by every
/// span start afterwards. An unset cell means "not initialized" and callers
/// fall back to a discarding tracer.
static TRACER: OnceLock<TracerHandle> = OnceLock::new();

pub(crate) enum TracerHandle {
    Real(SdkTracer),
    Noop(NoopTracer),
}

pub(crate) fn handle() -> Option<&'static TracerHandle> {
    TRACER.get()
}

/// Install the process-wide tracer and connect the OTLP/gRPC export pipeline.
///
/// `app_name` and `version` become the `service.name` and `service.version`
/// resource attributes on every exported span. The collector endpoint and
/// channel behavior come from `config`; see [`TracerConfig`].
///
/// The connection is established lazily: `init` returns as soon as the
/// pipeline is wired up, and transport failures surface later as export
/// failures rather than here. Only a malformed endpoint or an exporter
/// build failure fail `init` itself. In noop mode nothing is connected at
/// all and the returned [`Shutdown`] is inert.
///
/// May be called once per process; a second call returns
/// [`Error::AlreadyInitialized`] and leaves the first tracer untouched.
/// The gRPC channel requires a running Tokio runtime.
///
/// ```no_run
/// use opentelemetry_facade::{init, TracerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tracer = init("checkout", env!("CARGO_PKG_VERSION"), TracerConfig::new())?;
///
///     // ... traced work ...
///
///     tracer.shutdown()?;
///     Ok(())
/// }
/// ```
pub fn init(
    app_name: impl Into<String>,
    version: impl Into<String>,
    config: TracerConfig,
) -> Result<Shutdown, Error> {
    if TRACER.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }

    if config.is_noop() {
        TRACER
            .set(TracerHandle::Noop(NoopTracer::new()))
            .map_err(|_| Error::AlreadyInitialized)?;
        otel_debug!(name: "Tracer.Init.Noop");
        return Ok(Shutdown { provider: None });
    }

    let endpoint = config.resolve_endpoint();
    let channel = grpc_channel(&endpoint, &config)?;
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(app_name.into())
        .with_attribute(KeyValue::new(SERVICE_VERSION, version.into()))
        .build();
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    if TRACER.set(TracerHandle::Real(tracer)).is_err() {
        // lost the race against a concurrent init; the winner's state stands
        let _ = provider.shutdown();
        return Err(Error::AlreadyInitialized);
    }

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());
    otel_debug!(name: "Tracer.Init.Complete", endpoint = endpoint);

    Ok(Shutdown {
        provider: Some(provider),
    })
}

/// Build the lazily-connected channel, applying keepalive parameters only for
/// the fields that were set.
fn grpc_channel(endpoint: &str, config: &TracerConfig) -> Result<Channel, Error> {
    let mut endpoint =
        Endpoint::from_shared(endpoint.to_owned()).map_err(|source| Error::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            source,
        })?;

    if let Some(interval) = config.keepalive_time() {
        endpoint = endpoint.http2_keep_alive_interval(interval);
    }
    if let Some(timeout) = config.keepalive_timeout() {
        endpoint = endpoint.keep_alive_timeout(timeout);
    }
    if let Some(enabled) = config.keepalive_while_idle() {
        endpoint = endpoint.keep_alive_while_idle(enabled);
    }

    Ok(endpoint.connect_lazy())
}

/// Handle returned by [`init`] that tears the export pipeline down.
#[derive(Debug)]
#[must_use = "call shutdown to flush buffered spans and observe export errors"]
pub struct Shutdown {
    pub(crate) provider: Option<SdkTracerProvider>,
}

impl Shutdown {
    /// Flush and shut down the export pipeline, closing the collector
    /// connection.
    ///
    /// Both steps run unconditionally: teardown is still attempted when the
    /// flush fails, and all errors are reported together as
    /// [`Error::Shutdown`]. Blocks until buffered spans are delivered or the
    /// pipeline's export timeout elapses. For a noop tracer this does
    /// nothing and returns `Ok`.
    pub fn shutdown(self) -> Result<(), Error> {
        let Some(provider) = self.provider else {
            return Ok(());
        };

        let mut errors = Vec::new();
        if let Err(err) = provider.force_flush() {
            errors.push(err);
        }
        if let Err(err) = provider.shutdown() {
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    #[test]
    fn noop_shutdown_is_inert() {
        let handle = Shutdown { provider: None };
        assert!(handle.shutdown().is_ok());
    }

    #[test]
    fn shutdown_flushes_and_tears_down() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();

        let mut span = provider.tracer("shutdown-tests").start("flushed");
        span.end();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);

        let handle = Shutdown {
            provider: Some(provider),
        };
        assert!(handle.shutdown().is_ok());
        // teardown reached the exporter and reset it
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn shutdown_aggregates_failures_from_both_steps() {
        let provider = SdkTracerProvider::builder().build();
        provider.shutdown().expect("first shutdown succeeds");

        let handle = Shutdown {
            provider: Some(provider),
        };
        match handle.shutdown() {
            Err(Error::Shutdown(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected aggregated shutdown error, got {other:?}"),
        }
    }
}
