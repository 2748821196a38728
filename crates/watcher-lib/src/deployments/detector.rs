//! Rollout detection from replica set life spans

use crate::model::{
    Application, ApplicationDeployment, ApplicationDeploymentDetails, ApplicationId,
    ApplicationKind, DeploymentNotifications, DeploymentState,
};
use crate::timeseries::{Aggregate, Time, TimeSeries};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of walking the life spans of an application's replica sets
#[derive(Debug, Default)]
pub struct Detection {
    pub deployments: Vec<ApplicationDeployment>,
    /// Replica set the application settled on, if any was observed alone
    pub current: Option<String>,
}

/// Walk life-span series keyed by replica set name and open a deployment
/// for every observed cut-over.
///
/// At each step the names with a positive value are the active set:
/// * no active name: gap, nothing happens
/// * one active name: closes the rollout in progress (extending it to
///   this step if it is the one that settled), then opens and closes an
///   instantaneous rollout if the name differs from the previous one
/// * several active names: opens a rollout to the first name differing
///   from the previous one, unless one is already in progress
///
/// Names are visited in lexicographic order, so the multi-active branch
/// picks the smallest new name. The walk stops at the end of the shortest
/// series.
pub fn detect(id: &ApplicationId, life_spans: &BTreeMap<String, TimeSeries>) -> Detection {
    let mut iters: Vec<_> = life_spans
        .iter()
        .map(|(name, ts)| (name.as_str(), ts.iter()))
        .collect();
    let mut detection = Detection::default();
    if iters.is_empty() {
        return detection;
    }

    let mut prev: Option<&str> = None;
    let mut in_progress: Option<usize> = None;
    let deployments = &mut detection.deployments;

    'walk: loop {
        let mut t = Time::default();
        let mut active = Vec::new();
        for (name, iter) in iters.iter_mut() {
            let Some((ts, v)) = iter.next() else {
                break 'walk;
            };
            t = ts;
            if v > 0.0 {
                active.push(*name);
            }
        }

        match active.as_slice() {
            [] => {}
            [curr] => {
                let Some(p) = prev else {
                    prev = Some(*curr);
                    continue;
                };
                if let Some(idx) = in_progress.take() {
                    let d: &mut ApplicationDeployment = &mut deployments[idx];
                    if d.name == *curr {
                        d.finished_at = Some(t);
                    }
                }
                if p == *curr {
                    continue;
                }
                let mut d = ApplicationDeployment::new(id.clone(), *curr, t);
                d.finished_at = Some(t);
                deployments.push(d);
                prev = Some(*curr);
            }
            names => {
                let Some(p) = prev else {
                    continue;
                };
                if in_progress.is_some() {
                    continue;
                }
                let Some(name) = names.iter().find(|n| **n != p) else {
                    continue;
                };
                deployments.push(ApplicationDeployment::new(id.clone(), *name, t));
                in_progress = Some(deployments.len() - 1);
                prev = Some(*name);
            }
        }
    }

    detection.current = prev.map(str::to_string);
    detection
}

/// Deployments of `app` visible in its world window
pub fn calc_deployments(app: &Application) -> Vec<ApplicationDeployment> {
    if app.id.kind != ApplicationKind::Deployment || app.instances.is_empty() {
        return Vec::new();
    }

    let mut aggregates: BTreeMap<String, Aggregate> = BTreeMap::new();
    let mut images: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for instance in &app.instances {
        let Some(pod) = &instance.pod else {
            continue;
        };
        if pod.replica_set.is_empty() {
            continue;
        }
        aggregates
            .entry(pod.replica_set.clone())
            .or_default()
            .add(pod.life_span.as_ref());
        let rs_images = images.entry(pod.replica_set.as_str()).or_default();
        for container in instance.containers.values() {
            if !container.image.is_empty() {
                rs_images.insert(container.image.as_str());
            }
        }
    }

    let life_spans: BTreeMap<String, TimeSeries> = aggregates
        .into_iter()
        .filter_map(|(name, agg)| agg.get().map(|ts| (name, ts)))
        .collect();

    let mut deployments = detect(&app.id, &life_spans).deployments;
    for d in &mut deployments {
        if let Some(set) = images.get(d.name.as_str()).filter(|s| !s.is_empty()) {
            d.details = Some(ApplicationDeploymentDetails {
                container_images: set.iter().map(|s| s.to_string()).collect(),
            });
        }
    }
    deployments
}

/// Synthetic record for an application first seen without rollout history.
///
/// Marked as already summarized so it never produces a notification.
pub fn calc_initial_deployment(app: &Application, now: Time) -> ApplicationDeployment {
    let mut name = "";
    let mut images = BTreeSet::new();
    for instance in &app.instances {
        if let Some(pod) = instance.pod.as_ref().filter(|p| !p.replica_set.is_empty()) {
            name = pod.replica_set.as_str();
        }
        for container in instance.containers.values() {
            if !container.image.is_empty() {
                images.insert(container.image.clone());
            }
        }
    }

    let mut d = ApplicationDeployment::new(app.id.clone(), name, now);
    d.finished_at = Some(now);
    if !images.is_empty() {
        d.details = Some(ApplicationDeploymentDetails {
            container_images: images.into_iter().collect(),
        });
    }
    d.notifications = Some(DeploymentNotifications {
        state: DeploymentState::Summary,
        ..Default::default()
    });
    d
}

/// How a detected deployment relates to the known ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    /// Known at this index with a different `finished_at`
    Finished(usize),
    New,
}

pub fn diff(known: &[ApplicationDeployment], d: &ApplicationDeployment) -> Change {
    match known.iter().position(|k| k.is_same(d)) {
        Some(idx) if known[idx].finished_at == d.finished_at => Change::Unchanged,
        Some(idx) => Change::Finished(idx),
        None => Change::New,
    }
}

/// Apply a change produced by `diff` to the application's known deployments
pub fn apply(app: &mut Application, change: Change, d: ApplicationDeployment) {
    match change {
        Change::Unchanged => {}
        Change::Finished(idx) => {
            if let Some(known) = app.deployments.get_mut(idx) {
                known.finished_at = d.finished_at;
                if d.details.is_some() {
                    known.details = d.details;
                }
            }
        }
        Change::New => app.add_deployment(d),
    }
}
