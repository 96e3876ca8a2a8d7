use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

/// Errors returned by tracer initialization and shutdown.
///
/// Span-facing operations never return errors; only the lifecycle surface
/// does.
#[derive(Debug, Error)]
pub enum Error {
    /// [`init`] was called a second time in the same process. The tracer
    /// installed by the first call is left untouched.
    ///
    /// [`init`]: crate::init
    #[error("tracer already initialized")]
    AlreadyInitialized,

    /// The resolved collector endpoint was rejected by the transport.
    #[error("invalid collector endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        /// The endpoint URI that failed to parse.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: tonic::transport::Error,
    },

    /// Building the OTLP span exporter failed.
    #[error(transparent)]
    Exporter(#[from] ExporterBuildError),

    /// Shutting down the export pipeline failed. Flush and provider teardown
    /// are both attempted unconditionally; every failure is collected here.
    #[error("tracer shutdown failed: {0:?}")]
    Shutdown(Vec<OTelSdkError>),
}
