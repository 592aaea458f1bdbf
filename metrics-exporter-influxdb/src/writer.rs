use std::{
    collections::BTreeMap,
    fmt::Write as _,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{dimensions::collect_dimensions, metric::Metric, sanitize::sanitize_name};

const COMMENT: char = '#';

/// How metric values are rendered in the `value` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueFormat {
    /// Six digits after the decimal point, such as `0.730000`.
    #[default]
    Fixed,

    /// The shortest representation that parses back to the same value, such as `0.73`.
    Shortest,
}

/// Encodes metrics as line protocol lines.
///
/// Each line has the form `<prefix><name>[,<key>=<value>]* value=<float> <unix seconds>\n`, where the name, keys and
/// values are sanitized and the dimensions are written in ascending order of their sanitized key. Two metrics with the
/// same name and dimensions therefore always produce the same tag section, regardless of the order the dimensions were
/// inserted in.
#[derive(Clone, Debug, Default)]
pub struct LineEncoder {
    prefix: Option<String>,
    default_dimensions: BTreeMap<String, String>,
    value_format: ValueFormat,
}

impl LineEncoder {
    /// Creates a new `LineEncoder`.
    ///
    /// The prefix is prepended verbatim to every metric name, so it should carry its own separator, e.g. `app.`.
    /// If the line would start with `#`, which InfluxDB treats as a comment, that character is replaced with `_`.
    pub fn new(
        prefix: Option<String>,
        default_dimensions: BTreeMap<String, String>,
        value_format: ValueFormat,
    ) -> Self {
        Self { prefix, default_dimensions, value_format }
    }

    /// Returns the name prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the default dimensions applied to every metric.
    pub fn default_dimensions(&self) -> &BTreeMap<String, String> {
        &self.default_dimensions
    }

    /// Encodes `metric`, stamping it with the current time.
    pub fn encode(&self, metric: &Metric) -> String {
        self.encode_at(metric, unix_timestamp())
    }

    /// Encodes `metric` with the given timestamp, in seconds since the Unix epoch.
    pub fn encode_at(&self, metric: &Metric, timestamp: u64) -> String {
        let mut line = String::new();
        self.write_line(&mut line, metric, timestamp);
        line
    }

    /// Appends the encoded line for `metric` to `buf`.
    pub fn write_line(&self, buf: &mut String, metric: &Metric, timestamp: u64) {
        let dimensions = collect_dimensions(metric, &self.default_dimensions);

        let start = buf.len();
        if let Some(prefix) = &self.prefix {
            buf.push_str(prefix);
        }
        buf.push_str(&sanitize_name(&metric.name));

        // A line starting with `#` is a comment to InfluxDB, and would be dropped.
        if buf[start..].starts_with(COMMENT) {
            buf.replace_range(start..start + COMMENT.len_utf8(), "_");
        }

        // `BTreeMap` iterates in ascending key order.
        for (key, value) in &dimensions {
            buf.push(',');
            buf.push_str(key);
            buf.push('=');
            buf.push_str(value);
        }

        buf.push_str(" value=");
        write_value(buf, metric.value, self.value_format);

        buf.push(' ');
        buf.push_str(itoa::Buffer::new().format(timestamp));
        buf.push('\n');
    }
}

/// Encodes a single metric with the given default dimensions and name prefix.
pub fn encode(metric: &Metric, default_dimensions: &BTreeMap<String, String>, prefix: &str) -> String {
    let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
    LineEncoder::new(prefix, default_dimensions.clone(), ValueFormat::Fixed).encode(metric)
}

fn write_value(buf: &mut String, value: f64, format: ValueFormat) {
    match format {
        // Writing into a `String` cannot fail.
        ValueFormat::Fixed => {
            let _ = write!(buf, "{value:.6}");
        }
        ValueFormat::Shortest => buf.push_str(ryu::Buffer::new().format(value)),
    }
}

/// Returns the current time in whole seconds since the Unix epoch.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}
