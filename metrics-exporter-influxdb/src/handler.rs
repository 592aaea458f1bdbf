use std::{
    io::{self, Write as _},
    sync::OnceLock,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, error, info, trace, warn, Span};

use crate::{
    metric::Metric,
    telemetry::{Telemetry, TelemetryUpdate},
    transport::{RemoteAddr, Transport, UdpTransport},
    writer::{unix_timestamp, LineEncoder},
};

/// Type identifier of the InfluxDB handler.
pub const INFLUXDB_HANDLER_NAME: &str = "InfluxDB";

/// An output adapter that periodically receives batches of metrics to emit.
pub trait Handler: Send + Sync {
    /// Returns the type identifier of this handler.
    fn name(&self) -> &'static str;

    /// Returns how often buffered metrics should be emitted.
    fn interval(&self) -> Duration;

    /// Returns how many metrics may be buffered before they are emitted early.
    fn max_buffer_size(&self) -> usize;

    /// Emits a batch of metrics.
    ///
    /// Returns `true` if the batch was handed to the transport, and `false` otherwise. Failures never propagate any
    /// further than this: callers decide whether a `false` is worth counting.
    fn emit(&self, metrics: &[Metric]) -> bool;
}

impl<H> Handler for Box<H>
where
    H: Handler + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn interval(&self) -> Duration {
        (**self).interval()
    }

    fn max_buffer_size(&self) -> usize {
        (**self).max_buffer_size()
    }

    fn emit(&self, metrics: &[Metric]) -> bool {
        (**self).emit(metrics)
    }
}

/// Reasons a batch was not emitted.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The batch had no metrics in it.
    #[error("skipping send because of an empty payload")]
    EmptyBatch,

    /// The handler has no server or port configured.
    #[error("no server or port configured")]
    Unconfigured,

    /// The connection to the remote server could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was being connected to.
        addr: String,

        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Sends metrics to InfluxDB using the line protocol.
///
/// Every call to [`emit`][InfluxDbHandler::emit] opens a fresh connection, writes one line per metric, and drops the
/// connection before returning. Nothing is carried over between batches: a failed batch is not retried, and the next
/// batch connects again from scratch.
///
/// Handlers are built with [`InfluxDbBuilder`][crate::InfluxDbBuilder].
pub struct InfluxDbHandler<T = UdpTransport> {
    pub(crate) remote_addr: Option<RemoteAddr>,
    pub(crate) timeout: Duration,
    pub(crate) interval: Duration,
    pub(crate) max_buffer_size: usize,
    pub(crate) encoder: LineEncoder,
    pub(crate) transport: T,
    pub(crate) span: Span,
    pub(crate) telemetry_enabled: bool,
    pub(crate) telemetry: OnceLock<Telemetry>,
}

impl<T> InfluxDbHandler<T>
where
    T: Transport,
{
    /// Returns the remote address, or `None` if the server or port was never configured.
    pub fn remote_addr(&self) -> Option<&RemoteAddr> {
        self.remote_addr.as_ref()
    }

    /// Returns `true` if both the server and port are configured.
    pub fn is_configured(&self) -> bool {
        self.remote_addr.is_some()
    }

    /// Returns the connection timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the encoder used to turn metrics into lines.
    pub fn encoder(&self) -> &LineEncoder {
        &self.encoder
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Emits a batch of metrics, returning the number of lines written on success.
    ///
    /// Lines that fail to write are dropped silently and are not included in the count.
    ///
    /// # Errors
    ///
    /// If the batch is empty, the handler is not configured, or the connection cannot be established, an error is
    /// returned and nothing is written.
    pub fn try_emit(&self, metrics: &[Metric]) -> Result<usize, EmitError> {
        if metrics.is_empty() {
            return Err(EmitError::EmptyBatch);
        }

        let remote_addr = self.remote_addr.as_ref().ok_or(EmitError::Unconfigured)?;

        let mut update = TelemetryUpdate::default();
        let mut conn = match self.transport.connect(remote_addr, self.timeout) {
            Ok(conn) => conn,
            Err(source) => {
                update.track_batch_dropped(metrics.len());
                self.update_telemetry(&update);
                return Err(EmitError::Connect { addr: remote_addr.to_string(), source });
            }
        };

        let mut line = String::new();
        let mut lines_sent = 0;
        for metric in metrics {
            line.clear();
            self.encoder.write_line(&mut line, metric, unix_timestamp());

            // Each line is fire-and-forget: a failed write only affects that line.
            match conn.write_all(line.as_bytes()) {
                Ok(()) => {
                    update.track_line_sent(line.len());
                    lines_sent += 1;
                }
                Err(e) => {
                    trace!(error = %e, "Failed to write line.");
                    update.track_line_dropped();
                }
            }
        }

        update.track_batch_sent();
        self.update_telemetry(&update);

        Ok(lines_sent)
    }

    /// Emits a batch of metrics.
    ///
    /// Returns `true` once every line has been handed to the transport, regardless of whether any of them actually
    /// arrive. Returns `false`, without touching the network, if the batch is empty or the handler is not configured,
    /// and `false` if the connection could not be established.
    pub fn emit(&self, metrics: &[Metric]) -> bool {
        let _entered = self.span.enter();
        info!(num_metrics = metrics.len(), "Starting to emit metrics.");

        match self.try_emit(metrics) {
            Ok(lines_sent) => {
                debug!(lines_sent, "Finished sending metrics.");
                true
            }
            Err(EmitError::EmptyBatch) => {
                warn!("Skipping send because of an empty payload.");
                false
            }
            // Already reported when the handler was built.
            Err(EmitError::Unconfigured) => {
                debug!("Skipping send because no server or port is configured.");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to send metrics.");
                false
            }
        }
    }

    fn update_telemetry(&self, update: &TelemetryUpdate) {
        // Counters are registered lazily so that they go through whichever recorder is installed by the time metrics
        // actually start flowing, rather than the one present when the handler was built.
        if self.telemetry_enabled {
            let telemetry =
                self.telemetry.get_or_init(|| Telemetry::new(INFLUXDB_HANDLER_NAME, self.transport.id()));
            telemetry.apply_update(update);
        }
    }
}

impl<T> Handler for InfluxDbHandler<T>
where
    T: Transport + Send + Sync,
{
    fn name(&self) -> &'static str {
        INFLUXDB_HANDLER_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    fn emit(&self, metrics: &[Metric]) -> bool {
        InfluxDbHandler::emit(self, metrics)
    }
}
