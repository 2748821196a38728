//! Topology construction
//!
//! Issues every catalog query against a `MetricsSource`, groups the results
//! and rebuilds the `World` for the requested window. Construction is
//! best-effort: samples that reference unknown pods or applications are
//! logged and skipped, only a failing query aborts the load.

mod containers;
mod k8s;
mod sli;


use crate::error::Result;
use crate::ingest::{group, Metrics, MetricValues, Query, RawSeries};
use crate::model::{ProjectId, World};
use crate::timeseries::{Duration, Time};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use k8s::Pods;

/// Read side of a project's metrics cache
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Latest timestamp the cache holds data for; `Time(0)` when empty
    async fn get_to(&self) -> Result<Time>;

    /// Range query restricted to series matching every `(label, value)` filter
    async fn query_range(
        &self,
        query: Query,
        from: Time,
        to: Time,
        step: Duration,
        filters: &[(String, String)],
    ) -> Result<Vec<RawSeries>>;
}

/// Hands out the metrics source of each project
pub trait MetricsCache: Send + Sync {
    fn source(&self, project: &ProjectId) -> Arc<dyn MetricsSource>;
}

/// Builds worlds from one metrics source
pub struct Constructor {
    source: Arc<dyn MetricsSource>,
}

impl Constructor {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    /// Load the world of `[from, to)` at `step`
    pub async fn load_world(
        &self,
        from: Time,
        to: Time,
        step: Duration,
        filters: &[(String, String)],
    ) -> Result<World> {
        let mut results = Vec::with_capacity(Query::ALL.len());
        for query in Query::ALL {
            let series = self
                .source
                .query_range(query, from, to, step, filters)
                .await?;
            results.push((query.name().to_string(), series));
        }
        let metrics = group(from, to, step, results);
        let world = build_world(from, to, step, &metrics);
        debug!(
            from = %from,
            to = %to,
            applications = world.applications.len(),
            services = world.services.len(),
            nodes = world.nodes.len(),
            "World loaded"
        );
        Ok(world)
    }
}

/// Assemble a world from grouped metrics
pub fn build_world(from: Time, to: Time, step: Duration, metrics: &Metrics) -> World {
    let mut world = World::new(from, to, step);
    k8s::load_nodes(&mut world, values(metrics, Query::NodeInfo));
    let pods = k8s::load_kubernetes_metadata(&mut world, metrics);
    containers::load_containers(&mut world, metrics, &pods);
    sli::load_slis(&mut world, metrics);
    world
}

fn values(metrics: &Metrics, query: Query) -> &[MetricValues] {
    metrics.get(&query).map(Vec::as_slice).unwrap_or(&[])
}
