use std::collections::BTreeMap;

use crate::{metric::Metric, sanitize::sanitize};

/// Collects the sanitized dimensions for a metric.
///
/// Default dimensions are applied first and the metric's own dimensions second, each in ascending order of their
/// original key, with every key and value sanitized along the way. When two original keys sanitize to the same key,
/// the entry processed last wins: a metric dimension always beats a default, and within the same source the greater
/// original key wins.
///
/// The returned map iterates in ascending byte-wise order of the sanitized key.
pub fn collect_dimensions(
    metric: &Metric,
    defaults: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    metric
        .dimensions_with(defaults)
        .map(|(key, value)| (sanitize(key).into_owned(), sanitize(value).into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::collect_dimensions;
    use crate::metric::Metric;

    fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn sanitizes_keys_and_values() {
        let metric = Metric::new("cpu", 1.0).with_dimension("host.name", "a.b").with_dimension("dc", "us east");
        let collected = collect_dimensions(&metric, &dims(&[("env", "prod")]));

        assert_eq!(collected, dims(&[("dc", "us_east"), ("env", "prod"), ("host_name", "a_b")]));
    }

    #[test]
    fn metric_dimensions_beat_defaults() {
        let metric = Metric::new("cpu", 1.0).with_dimension("env", "staging");
        let collected = collect_dimensions(&metric, &dims(&[("env", "prod")]));

        assert_eq!(collected, dims(&[("env", "staging")]));
    }

    #[test]
    fn collision_within_metric_dimensions() {
        // "a b" sorts before "a.b", so "a.b" is processed last and wins.
        let metric = Metric::new("cpu", 1.0).with_dimension("a.b", "dot").with_dimension("a b", "space");
        let collected = collect_dimensions(&metric, &BTreeMap::new());

        assert_eq!(collected, dims(&[("a_b", "dot")]));
    }

    #[test]
    fn collision_between_defaults_and_metric() {
        // The default only collides after sanitization, and the metric dimension still wins.
        let metric = Metric::new("cpu", 1.0).with_dimension("host_name", "mine");
        let collected = collect_dimensions(&metric, &dims(&[("host.name", "default")]));

        assert_eq!(collected, dims(&[("host_name", "mine")]));
    }

    #[test]
    fn metric_dimension_wins_even_when_its_key_sorts_first() {
        // "a b" sorts before "a.b", so merging the raw keys first and sanitizing afterwards would let the default win.
        let metric = Metric::new("cpu", 1.0).with_dimension("a b", "mine");
        let collected = collect_dimensions(&metric, &dims(&[("a.b", "default")]));

        assert_eq!(collected, dims(&[("a_b", "mine")]));
    }

    #[test]
    fn does_not_mutate_metric() {
        let metric = Metric::new("cpu", 1.0).with_dimension("a.b", "c.d");
        let before = metric.clone();
        let _ = collect_dimensions(&metric, &dims(&[("x", "y")]));

        assert_eq!(metric, before);
    }
}
