//! Post-rollout metrics snapshots

use crate::model::{
    Application, LogLevel, MetricsSnapshot, METRICS_SNAPSHOT_SHIFT, METRICS_SNAPSHOT_WINDOW,
};
use crate::timeseries::{nan_sum, Aggregate, Duration, LinearRegression, Time, TimeSeries, HOUR};

/// Placement of the snapshot window relative to a rollout's end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSettings {
    /// Delay after `finished_at` before the window opens
    pub shift: Duration,
    pub window: Duration,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            shift: METRICS_SNAPSHOT_SHIFT,
            window: METRICS_SNAPSHOT_WINDOW,
        }
    }
}

/// A snapshot that can be calculated now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueSnapshot {
    /// Index into the application's deployments
    pub index: usize,
    pub from: Time,
    pub to: Time,
}

/// Snapshot window of a rollout that finished at `finished_at`
pub fn snapshot_window(finished_at: Time, step: Duration, settings: SnapshotSettings) -> (Time, Time) {
    let from = (finished_at + settings.shift).truncate(step);
    let to = (from + settings.window).truncate(step);
    (from, to)
}

/// Deployments whose snapshot window has fully elapsed.
///
/// A window must end no later than the start of the next deployment, or
/// `now` for the last one; unfinished or already summarized deployments
/// are skipped.
pub fn due_snapshots(
    app: &Application,
    now: Time,
    step: Duration,
    settings: SnapshotSettings,
) -> Vec<DueSnapshot> {
    let deployments = &app.deployments;
    deployments
        .iter()
        .enumerate()
        .filter(|(_, d)| d.metrics_snapshot.is_none())
        .filter_map(|(index, d)| {
            let (from, to) = snapshot_window(d.finished_at?, step, settings);
            let next_or_now = deployments
                .get(index + 1)
                .map(|next| next.started_at)
                .unwrap_or(now);
            (to <= next_or_now).then_some(DueSnapshot { index, from, to })
        })
        .collect()
}

/// Summarize the health of `app` over `[from, to)`.
///
/// Rates are integrated over the window (per-second value times the step),
/// counters are summed, memory growth is extrapolated over one hour.
pub fn calc_metrics_snapshot(app: &Application, from: Time, to: Time, step: Duration) -> MetricsSnapshot {
    let mut ms = MetricsSnapshot {
        timestamp: to,
        duration: to - from,
        ..Default::default()
    };

    if let Some(sli) = app.availability_slis.first() {
        ms.requests = sum_rate(sli.total_requests.as_ref(), step) as i64;
        ms.errors = sum_rate(sli.failed_requests.as_ref(), step) as i64;
    }
    if let Some(sli) = app.latency_slis.first() {
        for bucket in &sli.histogram {
            ms.latency.insert(
                format_bound(bucket.le),
                sum_rate(Some(&bucket.series), step) as i64,
            );
        }
    }

    let mut cpu_usage = Aggregate::new(nan_sum);
    let mut memory_rss = Aggregate::new(nan_sum);
    let mut restarts = Aggregate::new(nan_sum);
    let mut oom_kills = Aggregate::new(nan_sum);
    let mut log_errors = Aggregate::new(nan_sum);
    let mut log_warnings = Aggregate::new(nan_sum);
    for instance in &app.instances {
        for container in instance.containers.values() {
            cpu_usage.add(container.cpu_usage.as_ref());
            memory_rss.add(container.memory_rss.as_ref());
            restarts.add(container.restarts.as_ref());
            oom_kills.add(container.oom_kills.as_ref());
        }
        for (level, ts) in &instance.log_messages_by_level {
            match level {
                LogLevel::Critical | LogLevel::Error => log_errors.add(Some(ts)),
                LogLevel::Warning => log_warnings.add(Some(ts)),
                _ => continue,
            };
        }
    }

    ms.cpu_usage = sum_rate(cpu_usage.get().as_ref(), step);
    if let Some(lr) = memory_rss.get().as_ref().and_then(LinearRegression::new) {
        ms.memory_leak = (lr.calc(from + HOUR) - lr.calc(from)) as i64;
    }
    ms.restarts = sum(restarts.get().as_ref()) as i64;
    ms.oom_kills = sum(oom_kills.get().as_ref()) as i64;
    ms.log_errors = sum(log_errors.get().as_ref()) as i64;
    ms.log_warnings = sum(log_warnings.get().as_ref()) as i64;
    ms
}

/// Histogram bound formatted with 3 decimals, `+Inf` for the last bucket
fn format_bound(le: f32) -> String {
    if le.is_infinite() && le > 0.0 {
        "+Inf".to_string()
    } else {
        format!("{le:.3}")
    }
}

/// Sum of present samples, 0 for an absent or all-missing series
fn sum(ts: Option<&TimeSeries>) -> f32 {
    match ts.map(|ts| ts.reduce(nan_sum)) {
        Some(v) if !v.is_nan() => v,
        _ => 0.0,
    }
}

/// Per-second rate integrated over the series
fn sum_rate(ts: Option<&TimeSeries>, step: Duration) -> f32 {
    sum(ts) * step.as_secs() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ApplicationDeployment, ApplicationId, ApplicationKind, AvailabilitySli, HistogramBucket,
        LatencySli, MetricsSnapshot,
    };
    use crate::timeseries::{MINUTE, NAN};

    const STEP: Duration = Duration(60);

    fn app() -> Application {
        Application::new(ApplicationId::new("default", ApplicationKind::Deployment, "api"))
    }

    fn finished(app: &Application, name: &str, started: i64, finished: i64) -> ApplicationDeployment {
        let mut d = ApplicationDeployment::new(app.id.clone(), name, Time(started));
        d.finished_at = Some(Time(finished));
        d
    }

    fn series(from: i64, data: Vec<f32>) -> TimeSeries {
        TimeSeries::with_data(Time(from), STEP, data)
    }

    #[test]
    fn test_snapshot_window_defaults() {
        let (from, to) = snapshot_window(Time(1_000), STEP, SnapshotSettings::default());
        assert_eq!(from, Time(1_020));
        assert_eq!(to, Time(1_020 + 1_800));
    }

    #[test]
    fn test_due_snapshots_wait_for_full_window() {
        let mut app = app();
        let settings = SnapshotSettings {
            shift: MINUTE,
            window: Duration(600),
        };
        app.add_deployment(finished(&app, "rs-1", 0, 0));
        app.add_deployment(finished(&app, "rs-2", 600, 600));
        app.add_deployment(ApplicationDeployment::new(app.id.clone(), "rs-3", Time(1_000)));

        // rs-1 window [60, 660) overlaps rs-2, rs-2 window [660, 1260) overlaps rs-3,
        // rs-3 has not finished
        assert!(due_snapshots(&app, Time(10_000), STEP, settings).is_empty());

        app.deployments.pop();
        assert!(due_snapshots(&app, Time(1_200), STEP, settings).is_empty());
        let due = due_snapshots(&app, Time(1_260), STEP, settings);
        assert_eq!(
            due,
            vec![DueSnapshot {
                index: 1,
                from: Time(660),
                to: Time(1_260)
            }]
        );
    }

    #[test]
    fn test_due_snapshots_skip_summarized() {
        let mut app = app();
        let mut d = finished(&app, "rs-1", 0, 0);
        d.metrics_snapshot = Some(MetricsSnapshot::default());
        app.add_deployment(d);
        assert!(due_snapshots(&app, Time(100_000), STEP, SnapshotSettings::default()).is_empty());
    }

    #[test]
    fn test_calc_metrics_snapshot() {
        let mut app = app();
        app.availability_slis.push(AvailabilitySli {
            total_requests: Some(series(0, vec![10.0, 10.0, NAN])),
            failed_requests: Some(series(0, vec![0.5, NAN, NAN])),
        });
        app.latency_slis.push(LatencySli {
            histogram: vec![
                HistogramBucket {
                    le: 0.1,
                    series: series(0, vec![8.0, 8.0, 8.0]),
                },
                HistogramBucket {
                    le: f32::INFINITY,
                    series: series(0, vec![10.0, 10.0, 10.0]),
                },
            ],
        });
        let idx = app.get_or_create_instance("api-1", None);
        let instance = &mut app.instances[idx];
        let container = instance.get_or_create_container("app");
        container.cpu_usage = Some(series(0, vec![0.5, 0.5, 0.5]));
        container.memory_rss = Some(series(0, vec![100.0, 160.0, 220.0]));
        container.restarts = Some(series(0, vec![NAN, 1.0, 0.0]));
        instance
            .log_messages_by_level
            .insert(LogLevel::Error, series(0, vec![2.0, 1.0, NAN]));
        instance
            .log_messages_by_level
            .insert(LogLevel::Critical, series(0, vec![1.0, NAN, NAN]));
        instance
            .log_messages_by_level
            .insert(LogLevel::Warning, series(0, vec![4.0, 0.0, 0.0]));
        instance
            .log_messages_by_level
            .insert(LogLevel::Info, series(0, vec![100.0, 100.0, 100.0]));

        let ms = calc_metrics_snapshot(&app, Time(0), Time(180), STEP);
        assert_eq!(ms.timestamp, Time(180));
        assert_eq!(ms.duration, Duration(180));
        assert_eq!(ms.requests, 1_200);
        assert_eq!(ms.errors, 30);
        assert_eq!(ms.latency["0.100"], 1_440);
        assert_eq!(ms.latency["+Inf"], 1_800);
        assert_eq!(ms.cpu_usage, 90.0);
        assert_eq!(ms.memory_leak, 3_600);
        assert_eq!(ms.restarts, 1);
        assert_eq!(ms.oom_kills, 0);
        assert_eq!(ms.log_errors, 4);
        assert_eq!(ms.log_warnings, 4);
    }

    #[test]
    fn test_calc_metrics_snapshot_without_data() {
        let ms = calc_metrics_snapshot(&app(), Time(0), Time(600), STEP);
        assert_eq!(ms.requests, 0);
        assert_eq!(ms.memory_leak, 0);
        assert!(ms.latency.is_empty());
    }
}
