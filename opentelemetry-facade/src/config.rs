use std::env;
use std::time::Duration;

/// Signal-specific environment variable consulted for the collector endpoint.
pub(crate) const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Generic environment variable consulted when the signal-specific one is unset.
pub(crate) const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const DEFAULT_COLLECTOR_HOST: &str = "localhost";
const DEFAULT_COLLECTOR_PORT: u16 = 4317;

/// Configuration for [`init`].
///
/// Built with chained `with_*` calls over the defaults; later calls override
/// earlier ones for the same field. Defaults are host `localhost`, port
/// `4317`, keepalive disabled and export enabled.
///
/// Keepalive negotiation on the gRPC channel is presence-triggered: it stays
/// disabled unless at least one keepalive field is set, and only the fields
/// that were set are applied to the channel.
///
/// ```no_run
/// use std::time::Duration;
/// use opentelemetry_facade::TracerConfig;
///
/// let config = TracerConfig::new()
///     .with_collector_host("otel-collector")
///     .with_collector_port(4317)
///     .with_keepalive_time(Duration::from_secs(30));
/// ```
///
/// [`init`]: crate::init
#[derive(Clone, Debug, Default)]
pub struct TracerConfig {
    host: Option<String>,
    port: Option<u16>,
    keepalive_time: Option<Duration>,
    keepalive_timeout: Option<Duration>,
    keepalive_while_idle: Option<bool>,
    noop: bool,
}

impl TracerConfig {
    /// Create a configuration with all fields at their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable export entirely and install a discarding tracer (for tests and
    /// local development). No network objects are created in this mode.
    pub fn with_noop(mut self) -> Self {
        self.noop = true;
        self
    }

    /// Set the collector host the exporter connects to.
    pub fn with_collector_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the collector port the exporter connects to.
    pub fn with_collector_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enable keepalive and set the interval between HTTP/2 keepalive pings.
    pub fn with_keepalive_time(mut self, interval: Duration) -> Self {
        self.keepalive_time = Some(interval);
        self
    }

    /// Enable keepalive and set how long to wait for a ping acknowledgement
    /// before the connection is considered dead.
    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = Some(timeout);
        self
    }

    /// Enable keepalive and set whether pings are sent while no export stream
    /// is active.
    pub fn with_keepalive_while_idle(mut self, enabled: bool) -> Self {
        self.keepalive_while_idle = Some(enabled);
        self
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.noop
    }

    pub(crate) fn keepalive_time(&self) -> Option<Duration> {
        self.keepalive_time
    }

    pub(crate) fn keepalive_timeout(&self) -> Option<Duration> {
        self.keepalive_timeout
    }

    pub(crate) fn keepalive_while_idle(&self) -> Option<bool> {
        self.keepalive_while_idle
    }

    /// The `host:port` target the exporter ships to, with defaults applied.
    pub(crate) fn collector_authority(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or(DEFAULT_COLLECTOR_HOST),
            self.port.unwrap_or(DEFAULT_COLLECTOR_PORT)
        )
    }

    /// Resolve the endpoint URI handed to the transport.
    ///
    /// Explicit host/port options always win. When neither was set, the
    /// OTLP endpoint environment variables are consulted (signal-specific
    /// first), falling back to `http://localhost:4317`. Empty values are
    /// ignored.
    pub(crate) fn resolve_endpoint(&self) -> String {
        if self.host.is_none() && self.port.is_none() {
            for var in [OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, OTEL_EXPORTER_OTLP_ENDPOINT] {
                if let Ok(endpoint) = env::var(var) {
                    if !endpoint.trim().is_empty() {
                        return endpoint;
                    }
                }
            }
        }
        format!("http://{}", self.collector_authority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_endpoint_env<T>(f: impl FnOnce() -> T) -> T {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, None::<&str>),
                (OTEL_EXPORTER_OTLP_ENDPOINT, None),
            ],
            f,
        )
    }

    #[test]
    fn default_target() {
        without_endpoint_env(|| {
            let config = TracerConfig::new();
            assert_eq!(config.collector_authority(), "localhost:4317");
            assert_eq!(config.resolve_endpoint(), "http://localhost:4317");
        });
    }

    #[test]
    fn explicit_host_and_port() {
        without_endpoint_env(|| {
            let config = TracerConfig::new()
                .with_collector_host("otel-agent")
                .with_collector_port(14317);
            assert_eq!(config.collector_authority(), "otel-agent:14317");
            assert_eq!(config.resolve_endpoint(), "http://otel-agent:14317");
        });
    }

    #[test]
    fn later_options_override_earlier_ones() {
        without_endpoint_env(|| {
            let config = TracerConfig::new()
                .with_collector_host("first")
                .with_collector_host("second");
            assert_eq!(config.collector_authority(), "second:4317");
        });
    }

    #[test]
    fn keepalive_disabled_unless_set() {
        let config = TracerConfig::new();
        assert!(config.keepalive_time().is_none());
        assert!(config.keepalive_timeout().is_none());
        assert!(config.keepalive_while_idle().is_none());

        // presence, not value, is what enables negotiation
        let config = TracerConfig::new().with_keepalive_while_idle(false);
        assert_eq!(config.keepalive_while_idle(), Some(false));
        assert!(config.keepalive_time().is_none());
    }

    #[test]
    fn endpoint_from_environment() {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, Some("http://traces:4317")),
                (OTEL_EXPORTER_OTLP_ENDPOINT, Some("http://generic:4317")),
            ],
            || {
                assert_eq!(
                    TracerConfig::new().resolve_endpoint(),
                    "http://traces:4317"
                );
            },
        );

        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, None),
                (OTEL_EXPORTER_OTLP_ENDPOINT, Some("http://generic:4317")),
            ],
            || {
                assert_eq!(
                    TracerConfig::new().resolve_endpoint(),
                    "http://generic:4317"
                );
            },
        );
    }

    #[test]
    fn explicit_options_beat_environment() {
        temp_env::with_var(OTEL_EXPORTER_OTLP_ENDPOINT, Some("http://from-env:4317"), || {
            let config = TracerConfig::new().with_collector_host("explicit");
            assert_eq!(config.resolve_endpoint(), "http://explicit:4317");
        });
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, Some("")),
                (OTEL_EXPORTER_OTLP_ENDPOINT, None),
            ],
            || {
                assert_eq!(
                    TracerConfig::new().resolve_endpoint(),
                    "http://localhost:4317"
                );
            },
        );
    }
}
