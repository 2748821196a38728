//! Metric ingestion
//!
//! Raw range-query results arrive as `(query name, [RawSeries])` pairs.
//! `group` lays every series onto the window's time grid and buckets the
//! resulting `MetricValues` by catalog query. Names outside the catalog
//! are dropped.

mod query;

pub use query::{Query, QueryFamily};

use crate::model::Labels;
use crate::timeseries::{Duration, Time, TimeSeries};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// One series as returned by the metrics source
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSeries {
    pub labels: Labels,
    /// `(unix seconds, value)` samples in any order
    pub points: Vec<(i64, f32)>,
}

impl RawSeries {
    pub fn new(labels: Labels, points: Vec<(i64, f32)>) -> Self {
        Self { labels, points }
    }
}

/// A label set and its samples on the window grid
#[derive(Debug, Clone)]
pub struct MetricValues {
    pub labels: Labels,
    pub values: TimeSeries,
}

/// Grouped ingestion results keyed by query
pub type Metrics = HashMap<Query, Vec<MetricValues>>;

/// Number of grid points in `[from, to)`
pub fn points_count(from: Time, to: Time, step: Duration) -> usize {
    if step.0 <= 0 || to <= from {
        return 0;
    }
    ((to - from).0 / step.0) as usize
}

/// Group raw results by query.
///
/// Samples of identical `(query, labels)` land in the same series; samples
/// outside `[from, to)` are dropped by `TimeSeries::set`.
pub fn group(
    from: Time,
    to: Time,
    step: Duration,
    results: impl IntoIterator<Item = (String, Vec<RawSeries>)>,
) -> Metrics {
    let count = points_count(from, to, step);
    let mut grouped = Metrics::new();
    for (name, series) in results {
        let Some(query) = Query::from_name(&name) else {
            debug!(query = %name, "Ignoring result of unknown query");
            continue;
        };
        let values = grouped.entry(query).or_default();
        let mut index: HashMap<Labels, usize> = values
            .iter()
            .enumerate()
            .map(|(i, mv)| (mv.labels.clone(), i))
            .collect();
        for raw in series {
            let idx = *index.entry(raw.labels.clone()).or_insert_with(|| {
                values.push(MetricValues {
                    labels: raw.labels.clone(),
                    values: TimeSeries::new(from, count, step),
                });
                values.len() - 1
            });
            let ts = &mut values[idx].values;
            for (t, v) in raw.points {
                if v.is_nan() {
                    continue;
                }
                ts.set(Time(t), v);
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::keys;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_group_merges_identical_label_sets() {
        let pod = labels(&[(keys::NAMESPACE, "default"), (keys::POD, "api-1")]);
        let results = vec![
            (
                "kube_pod_info".to_string(),
                vec![RawSeries::new(pod.clone(), vec![(0, 1.0), (30, 1.0)])],
            ),
            (
                "kube_pod_info".to_string(),
                vec![RawSeries::new(pod.clone(), vec![(60, 1.0)])],
            ),
        ];
        let metrics = group(Time(0), Time(120), Duration(30), results);
        let values = &metrics[&Query::PodInfo];
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].values.data()[..3], [1.0, 1.0, 1.0]);
        assert!(values[0].values.data()[3].is_nan());
    }

    #[test]
    fn test_group_ignores_unknown_queries() {
        let results = vec![(
            "up".to_string(),
            vec![RawSeries::new(labels(&[("job", "x")]), vec![(0, 1.0)])],
        )];
        assert!(group(Time(0), Time(60), Duration(30), results).is_empty());
    }

    #[test]
    fn test_group_aligns_and_bounds_points() {
        let results = vec![(
            "kube_node_info".to_string(),
            vec![RawSeries::new(
                labels(&[(keys::NODE, "node-1")]),
                vec![(-30, 5.0), (45, 2.0), (500, 9.0)],
            )],
        )];
        let metrics = group(Time(0), Time(90), Duration(30), results);
        let ts = &metrics[&Query::NodeInfo][0].values;
        assert_eq!(ts.len(), 3);
        assert!(ts.data()[0].is_nan());
        assert_eq!(ts.data()[1], 2.0);
        assert!(ts.data()[2].is_nan());
    }
}
