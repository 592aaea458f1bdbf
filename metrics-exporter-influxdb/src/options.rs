use std::{collections::BTreeMap, str::FromStr, time::Duration};

use crate::builder::BuildError;

pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_MAX_BUFFER_SIZE: usize = 100;
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_DIMENSION_PREFIX: &str = "default_dimensions.";

/// Options shared by every handler type.
///
/// Handler factories receive these when a handler is created by name through a
/// [`HandlerRegistry`][crate::HandlerRegistry]. Anything specific to a handler type, such as the InfluxDB server and
/// port, lives in `params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerOptions {
    /// How often buffered metrics are emitted.
    ///
    /// Defaults to 10 seconds.
    pub interval: Duration,

    /// Number of buffered metrics that triggers an early emission.
    ///
    /// Defaults to 100.
    pub max_buffer_size: usize,

    /// I/O timeout when connecting to the remote server.
    ///
    /// Defaults to 2 seconds.
    pub timeout: Duration,

    /// Prefix prepended to every metric name.
    pub prefix: Option<String>,

    /// Dimensions added to every metric.
    pub default_dimensions: BTreeMap<String, String>,

    /// Handler-specific parameters.
    pub params: BTreeMap<String, String>,
}

impl HandlerOptions {
    /// Builds `HandlerOptions` from raw string parameters.
    ///
    /// The common keys `interval` and `timeout` (both in seconds), `max_buffer_size` and `prefix` are consumed and
    /// parsed. Keys of the form `default_dimensions.<name>` add a default dimension called `<name>`. Every other key is
    /// kept as a handler-specific parameter.
    ///
    /// # Errors
    ///
    /// If one of the common keys holds a value that cannot be parsed, or a default dimension has an empty name, an
    /// error is returned.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = HandlerOptions::default();
        for (key, value) in params {
            let (key, value) = (key.into(), value.into());
            if let Some(name) = key.strip_prefix(DEFAULT_DIMENSION_PREFIX) {
                if name.is_empty() {
                    let reason = "dimension name is empty".to_string();
                    return Err(BuildError::InvalidOption { key, reason });
                }
                options.default_dimensions.insert(name.to_string(), value);
                continue;
            }

            match key.as_str() {
                "interval" => options.interval = Duration::from_secs(parse_option(&key, &value)?),
                "timeout" => options.timeout = Duration::from_secs(parse_option(&key, &value)?),
                "max_buffer_size" => options.max_buffer_size = parse_option(&key, &value)?,
                "prefix" => options.prefix = Some(value),
                _ => {
                    options.params.insert(key, value);
                }
            }
        }

        Ok(options)
    }

    /// Sets a handler-specific parameter.
    #[must_use]
    pub fn with_param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds a default dimension.
    #[must_use]
    pub fn with_default_dimension<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.default_dimensions.insert(key.into(), value.into());
        self
    }

    /// Returns the handler-specific parameter for `key`, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl Default for HandlerOptions {
    fn default() -> Self {
        HandlerOptions {
            interval: DEFAULT_INTERVAL,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
            prefix: None,
            default_dimensions: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }
}

fn parse_option<T>(key: &str, value: &str) -> Result<T, BuildError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| BuildError::InvalidOption { key: key.to_string(), reason: e.to_string() })
}
