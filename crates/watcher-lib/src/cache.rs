//! File-backed metrics cache
//!
//! The caching tier stores the latest range-query result of every catalog
//! query as a Prometheus `matrix` response, one file per query:
//!
//! ```text
//! <root>/<project id>/<query name>.json
//! ```
//!
//! Sample values are strings, as Prometheus encodes them (`"NaN"` and
//! `"+Inf"` included).

use crate::constructor::{MetricsCache, MetricsSource};
use crate::error::{Result, WatcherError};
use crate::ingest::{Query, RawSeries};
use crate::model::{Labels, ProjectId};
use crate::timeseries::{Duration, Time};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Root of the per-project cache directories
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn client(&self, project: &ProjectId) -> FileCacheClient {
        FileCacheClient {
            dir: self.root.join(&project.0),
        }
    }
}

impl MetricsCache for FileCache {
    fn source(&self, project: &ProjectId) -> Arc<dyn MetricsSource> {
        Arc::new(self.client(project))
    }
}

/// Cache of one project
#[derive(Debug, Clone)]
pub struct FileCacheClient {
    dir: PathBuf,
}

impl FileCacheClient {
    fn path(&self, query: Query) -> PathBuf {
        self.dir.join(format!("{}.json", query.name()))
    }

    /// Parsed series of `query`; a query the cache has not stored yet has no series
    async fn read(&self, query: Query) -> Result<Vec<MatrixSeries>> {
        let path = self.path(query);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let response: Response = serde_json::from_slice(&data)
            .map_err(|e| WatcherError::Parse(format!("{}: {e}", path.display())))?;
        if response.status != "success" {
            return Err(WatcherError::Source {
                query: query.name().to_string(),
                reason: response.error.unwrap_or(response.status),
            });
        }
        match response.data {
            Some(data) if data.result_type == "matrix" => Ok(data.result),
            Some(data) => Err(WatcherError::Parse(format!(
                "{}: unexpected result type {}",
                path.display(),
                data.result_type
            ))),
            None => Ok(Vec::new()),
        }
    }
}

fn parse_value(v: &str) -> Option<f32> {
    v.parse::<f32>().ok()
}

#[async_trait]
impl MetricsSource for FileCacheClient {
    async fn get_to(&self) -> Result<Time> {
        let mut to = Time::default();
        for query in Query::ALL {
            let series = match self.read(query).await {
                Ok(series) => series,
                Err(e) => {
                    warn!(query = %query, error = %e, "Skipping unreadable cache entry");
                    continue;
                }
            };
            for s in series {
                if let Some((t, _)) = s.values.last() {
                    to = to.max(Time(*t as i64));
                }
            }
        }
        Ok(to)
    }

    async fn query_range(
        &self,
        query: Query,
        from: Time,
        to: Time,
        _step: Duration,
        filters: &[(String, String)],
    ) -> Result<Vec<RawSeries>> {
        let series = self.read(query).await?;
        let mut result = Vec::with_capacity(series.len());
        for s in series {
            let labels = Labels::from(s.metric);
            if !labels.matches(filters) {
                continue;
            }
            let points = s
                .values
                .iter()
                .filter_map(|(t, v)| {
                    let t = Time(*t as i64);
                    if t < from || t > to {
                        return None;
                    }
                    parse_value(v).map(|v| (t.0, v))
                })
                .collect();
            result.push(RawSeries::new(labels, points));
        }
        debug!(query = %query, series = result.len(), "Cache query");
        Ok(result)
    }
}
