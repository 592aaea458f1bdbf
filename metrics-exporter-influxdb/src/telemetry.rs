use metrics::{counter, Counter};

/// Handler telemetry.
///
/// `Telemetry` collects information about the handler's behavior, such as how many batches were sent or dropped, and
/// reports it through the globally installed `metrics` recorder.
pub struct Telemetry {
    batches_sent: Counter,
    batches_dropped: Counter,
    metrics_encoded: Counter,
    lines_sent: Counter,
    lines_dropped: Counter,
    bytes_sent: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance.
    pub fn new(handler: &'static str, transport: &'static str) -> Self {
        let labels = telemetry_labels!("handler" => handler, "transport" => transport);

        Self {
            batches_sent: counter!("influxdb.handler.batches_sent", labels.iter()),
            batches_dropped: counter!("influxdb.handler.batches_dropped", labels.iter()),
            metrics_encoded: counter!("influxdb.handler.metrics_encoded", labels.iter()),
            lines_sent: counter!("influxdb.handler.lines_sent", labels.iter()),
            lines_dropped: counter!("influxdb.handler.lines_dropped", labels.iter()),
            bytes_sent: counter!("influxdb.handler.bytes_sent", labels.iter()),
        }
    }

    /// Applies the given telemetry update, updating the internal metrics.
    pub fn apply_update(&self, update: &TelemetryUpdate) {
        self.batches_sent.increment(update.batches_sent);
        self.batches_dropped.increment(update.batches_dropped);
        self.metrics_encoded.increment(update.metrics_encoded);
        self.lines_sent.increment(update.lines_sent);
        self.lines_dropped.increment(update.lines_dropped);
        self.bytes_sent.increment(update.bytes_sent);
    }
}

/// A buffer for collecting telemetry updates over a single batch.
#[derive(Debug, Default)]
pub struct TelemetryUpdate {
    batches_sent: u64,
    batches_dropped: u64,
    metrics_encoded: u64,
    lines_sent: u64,
    lines_dropped: u64,
    bytes_sent: u64,
}

impl TelemetryUpdate {
    /// Tracks a batch that was fully handed to the transport.
    pub fn track_batch_sent(&mut self) {
        self.batches_sent += 1;
    }

    /// Tracks a batch that was dropped before anything was written.
    pub fn track_batch_dropped(&mut self, metrics: usize) {
        self.batches_dropped += 1;
        self.lines_dropped += metrics as u64;
    }

    /// Tracks a successfully written line.
    pub fn track_line_sent(&mut self, bytes_len: usize) {
        self.metrics_encoded += 1;
        self.lines_sent += 1;
        self.bytes_sent += bytes_len as u64;
    }

    /// Tracks a line that was encoded but could not be written.
    pub fn track_line_dropped(&mut self) {
        self.metrics_encoded += 1;
        self.lines_dropped += 1;
    }
}

macro_rules! _telemetry_labels {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("client", "rust"),
            ::metrics::Label::from_static_parts("client_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::from_static_parts($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_labels as telemetry_labels;
