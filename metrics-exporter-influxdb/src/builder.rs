use std::{collections::BTreeMap, fmt::Display, sync::OnceLock, time::Duration};

use thiserror::Error;
use tracing::{error, info_span, Span};

use crate::{
    forwarder::{self, ForwarderHandle},
    handler::{InfluxDbHandler, INFLUXDB_HANDLER_NAME},
    options::{HandlerOptions, DEFAULT_INTERVAL, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_TIMEOUT},
    transport::{RemoteAddr, Transport, UdpTransport},
    writer::{LineEncoder, ValueFormat},
};

/// Errors that could occur while building handlers or spawning their forwarders.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No handler is registered under the given name.
    #[error("no handler registered under the name '{name}'")]
    UnknownHandler {
        /// Requested handler name.
        name: String,
    },

    /// A configuration option held a value that could not be parsed.
    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption {
        /// Option key.
        key: String,

        /// Details about the parsing failure.
        reason: String,
    },

    /// Failed to spawn the background forwarder thread.
    #[error("failed to spawn background thread for handler")]
    Backend,
}

/// Builder for an InfluxDB handler.
///
/// Both a server and a port must be configured for the handler to emit anything. A handler built without either one is
/// still usable, but logs an error once at build time and then rejects every batch without touching the network.
pub struct InfluxDbBuilder {
    server: Option<String>,
    port: Option<String>,
    interval: Duration,
    max_buffer_size: usize,
    timeout: Duration,
    prefix: Option<String>,
    default_dimensions: BTreeMap<String, String>,
    value_format: ValueFormat,
    telemetry: bool,
    span: Option<Span>,
}

impl InfluxDbBuilder {
    /// Creates a builder from common handler options.
    ///
    /// The server and port are read from the `server` and `port` parameters.
    pub fn from_options(options: &HandlerOptions) -> Self {
        InfluxDbBuilder {
            server: options.param("server").map(String::from),
            port: options.param("port").map(String::from),
            interval: options.interval,
            max_buffer_size: options.max_buffer_size,
            timeout: options.timeout,
            prefix: options.prefix.clone(),
            default_dimensions: options.default_dimensions.clone(),
            ..InfluxDbBuilder::default()
        }
    }

    /// Set the server name or IP address to send metrics to.
    #[must_use]
    pub fn with_server<S>(mut self, server: S) -> Self
    where
        S: Into<String>,
    {
        self.server = Some(server.into());
        self
    }

    /// Set the port to send metrics to.
    ///
    /// Anything that can be displayed is accepted, so both `8089` and `"8089"` work. The port is only validated when
    /// connecting, and an invalid port makes every batch fail to connect.
    #[must_use]
    pub fn with_port<P>(mut self, port: P) -> Self
    where
        P: Display,
    {
        self.port = Some(port.to_string());
        self
    }

    /// Set how often buffered metrics are emitted by the forwarder.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how many metrics the forwarder buffers before emitting early.
    ///
    /// Defaults to 100.
    #[must_use]
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    /// Set the I/O timeout used when connecting and writing.
    ///
    /// Defaults to 2 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a prefix to prepend to every metric name.
    ///
    /// The prefix is written as-is, so it should include its own separator, such as `app.`.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        self.prefix = Some(prefix.into());
        self
    }

    /// Add a dimension to every metric.
    ///
    /// Metrics that carry a dimension with the same key keep their own value.
    #[must_use]
    pub fn with_default_dimension<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.default_dimensions.insert(key.into(), value.into());
        self
    }

    /// Set how metric values are rendered.
    ///
    /// Defaults to [`ValueFormat::Fixed`].
    #[must_use]
    pub fn with_value_format(mut self, value_format: ValueFormat) -> Self {
        self.value_format = value_format;
        self
    }

    /// Sets whether or not to enable telemetry for the handler.
    ///
    /// When enabled, counters describing the handler's own behavior, such as the number of batches and lines sent or
    /// dropped, are registered with the installed `metrics` recorder.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Set the span that all of the handler's log events are recorded in.
    ///
    /// Defaults to an `INFO` span named `handler` with a `handler` field of `InfluxDB`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Builds a handler that sends metrics over UDP.
    pub fn build(self) -> InfluxDbHandler<UdpTransport> {
        self.build_with_transport(UdpTransport)
    }

    /// Builds a handler that sends metrics over the given transport.
    pub fn build_with_transport<T>(self, transport: T) -> InfluxDbHandler<T>
    where
        T: Transport,
    {
        let span = self.span.unwrap_or_else(|| info_span!("handler", handler = INFLUXDB_HANDLER_NAME));

        let remote_addr = span.in_scope(|| {
            if self.server.is_none() {
                error!("There was no server specified for the InfluxDB handler, there won't be any emissions.");
            }
            if self.port.is_none() {
                error!("There was no port specified for the InfluxDB handler, there won't be any emissions.");
            }

            self.server.zip(self.port).map(|(server, port)| RemoteAddr::new(server, port))
        });

        InfluxDbHandler {
            remote_addr,
            timeout: self.timeout,
            interval: self.interval,
            max_buffer_size: self.max_buffer_size,
            encoder: LineEncoder::new(self.prefix, self.default_dimensions, self.value_format),
            transport,
            span,
            telemetry_enabled: self.telemetry,
            telemetry: OnceLock::new(),
        }
    }

    /// Builds a UDP handler and spawns a forwarder thread to drive it.
    ///
    /// Metrics sent through the returned handle are buffered and emitted whenever the interval elapses or the buffer
    /// fills up.
    ///
    /// # Errors
    ///
    /// If the forwarder thread cannot be spawned, an error is returned.
    pub fn spawn(self) -> Result<ForwarderHandle, BuildError> {
        forwarder::spawn_forwarder(self.build())
    }
}

impl Default for InfluxDbBuilder {
    fn default() -> Self {
        InfluxDbBuilder {
            server: None,
            port: None,
            interval: DEFAULT_INTERVAL,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
            prefix: None,
            default_dimensions: BTreeMap::new(),
            value_format: ValueFormat::default(),
            telemetry: true,
            span: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::InfluxDbBuilder;
    use crate::{transport::RemoteAddr, HandlerOptions};

    #[test]
    fn numeric_port_is_rendered_as_string() {
        let handler = InfluxDbBuilder::default().with_server("influx.local").with_port(8089).build();
        assert_eq!(handler.remote_addr(), Some(&RemoteAddr::new("influx.local", "8089")));
    }

    #[test]
    fn missing_server_or_port_is_unconfigured() {
        assert!(!InfluxDbBuilder::default().build().is_configured());
        assert!(!InfluxDbBuilder::default().with_server("influx.local").build().is_configured());
        assert!(!InfluxDbBuilder::default().with_port("8089").build().is_configured());
    }

    #[test]
    fn from_options() {
        let options = HandlerOptions {
            timeout: Duration::from_millis(250),
            prefix: Some("app.".to_string()),
            ..HandlerOptions::default()
        }
        .with_param("server", "10.0.0.1")
        .with_param("port", "8089")
        .with_default_dimension("env", "prod");

        let handler = InfluxDbBuilder::from_options(&options).build();
        assert_eq!(handler.remote_addr(), Some(&RemoteAddr::new("10.0.0.1", "8089")));
        assert_eq!(handler.timeout(), Duration::from_millis(250));
        assert_eq!(handler.encoder().prefix(), Some("app."));
        assert_eq!(handler.encoder().default_dimensions().get("env").map(String::as_str), Some("prod"));
    }
}
