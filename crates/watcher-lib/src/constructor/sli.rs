//! Service level indicators attached by the `application` label

use super::values;
use crate::ingest::{Metrics, MetricValues, Query};
use crate::model::{Application, ApplicationId, AvailabilitySli, HistogramBucket, LatencySli, World};
use crate::timeseries::{merge, nan_sum};
use tracing::{debug, warn};

pub(super) fn load_slis(w: &mut World, metrics: &Metrics) {
    for query in [
        Query::SliRequestsTotal,
        Query::SliRequestsFailed,
        Query::SliLatencyBucket,
    ] {
        for m in values(metrics, query) {
            let Some(app) = application(w, m) else {
                continue;
            };
            match query {
                Query::SliRequestsTotal => {
                    merge(&mut availability(app).total_requests, &m.values, nan_sum)
                }
                Query::SliRequestsFailed => {
                    merge(&mut availability(app).failed_requests, &m.values, nan_sum)
                }
                Query::SliLatencyBucket => latency_bucket(app, m),
                _ => {}
            }
        }
    }
}

fn application<'a>(w: &'a mut World, m: &MetricValues) -> Option<&'a mut Application> {
    let id = match m.labels.application().parse::<ApplicationId>() {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Skipping SLI sample");
            return None;
        }
    };
    let app = w.get_application_mut(&id);
    if app.is_none() {
        debug!(application = %id, "SLI of unknown application");
    }
    app
}

fn availability(app: &mut Application) -> &mut AvailabilitySli {
    if app.availability_slis.is_empty() {
        app.availability_slis.push(AvailabilitySli::default());
    }
    &mut app.availability_slis[0]
}

/// Fold one bucket into the application's histogram, keeping it sorted by bound
fn latency_bucket(app: &mut Application, m: &MetricValues) {
    let le = match m.labels.le().parse::<f32>() {
        Ok(le) if !le.is_nan() => le,
        _ => {
            warn!(le = m.labels.le(), "Invalid histogram bucket bound");
            return;
        }
    };
    if app.latency_slis.is_empty() {
        app.latency_slis.push(LatencySli::default());
    }
    let histogram = &mut app.latency_slis[0].histogram;
    match histogram.iter().position(|b| b.le == le) {
        Some(idx) => {
            let mut series = Some(histogram[idx].series.clone());
            merge(&mut series, &m.values, nan_sum);
            if let Some(series) = series {
                histogram[idx].series = series;
            }
        }
        None => {
            let pos = histogram.partition_point(|b| b.le < le);
            histogram.insert(
                pos,
                HistogramBucket {
                    le,
                    series: m.values.clone(),
                },
            );
        }
    }
}
