use std::collections::BTreeMap;

use metrics::Key;

/// A single metric sample.
///
/// Dimensions are key/value pairs that give the sample additional context, such as the host or datacenter it was
/// collected from.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    /// Metric name.
    pub name: String,

    /// Metric value.
    pub value: f64,

    /// Dimensions attached to this sample.
    pub dimensions: BTreeMap<String, String>,
}

impl Metric {
    /// Creates a new `Metric` with no dimensions.
    pub fn new<N>(name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), value, dimensions: BTreeMap::new() }
    }

    /// Creates a new `Metric` from a [`metrics::Key`], converting its labels into dimensions.
    ///
    /// If the key has multiple labels with the same key, the last one wins.
    pub fn from_key(key: &Key, value: f64) -> Self {
        let dimensions = key
            .labels()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect();

        Self { name: key.name().to_string(), value, dimensions }
    }

    /// Adds a dimension to this metric, replacing any existing value for the same key.
    #[must_use]
    pub fn with_dimension<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.dimensions.insert(key.into(), value.into());
        self
    }

    /// Returns this metric's dimensions merged with the given default dimensions.
    ///
    /// Defaults come first and the metric's own dimensions second, each in ascending key order. A default that shares
    /// its key with one of the metric's own dimensions is skipped, so the metric's value takes precedence.
    pub fn dimensions_with<'a>(
        &'a self,
        defaults: &'a BTreeMap<String, String>,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        defaults
            .iter()
            .filter(move |(key, _)| !self.dimensions.contains_key(*key))
            .chain(self.dimensions.iter())
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}
