//! Durable storage of projects and deployment records
//!
//! `MemoryStore` keeps records in a sharded concurrent map; every write
//! holds the shard lock of that one record only. With a persistence path
//! configured, every write is followed by an atomic rewrite of the JSON
//! snapshot (temp file + rename).

use crate::error::{Result, WatcherError};
use crate::model::{ApplicationDeployment, ApplicationId, Project, ProjectId};
use crate::timeseries::Time;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Storage seam used by the deployment watcher.
///
/// Every write is idempotent: repeating it with the same input leaves the
/// same stored state.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn get_projects(&self) -> Result<Vec<Project>>;

    /// Deployments of a project ordered by application, then start time
    async fn get_deployments(&self, project: &ProjectId) -> Result<Vec<ApplicationDeployment>>;

    /// Insert a deployment, or update `finished_at` and details of the
    /// record with the same `(application, name, started_at)`
    async fn save_deployment(&self, project: &ProjectId, d: &ApplicationDeployment) -> Result<()>;

    async fn save_metrics_snapshot(
        &self,
        project: &ProjectId,
        d: &ApplicationDeployment,
    ) -> Result<()>;

    async fn save_notifications(&self, project: &ProjectId, d: &ApplicationDeployment)
        -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DeploymentKey {
    project: ProjectId,
    application: ApplicationId,
    name: String,
    started_at: Time,
}

impl DeploymentKey {
    fn new(project: &ProjectId, d: &ApplicationDeployment) -> Self {
        Self {
            project: project.clone(),
            application: d.application_id.clone(),
            name: d.name.clone(),
            started_at: d.started_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    deployments: Vec<StoredDeployment>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDeployment {
    project_id: ProjectId,
    #[serde(flatten)]
    deployment: ApplicationDeployment,
}

/// In-memory `DeploymentStore` with optional JSON persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: DashMap<ProjectId, Project>,
    deployments: DashMap<DeploymentKey, ApplicationDeployment>,
    path: Option<PathBuf>,
    /// Serializes snapshot rewrites
    persist_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store persisted at `path`, loading the existing snapshot if there is one
    pub async fn with_persistence(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = Self {
            path: Some(path.clone()),
            ..Self::default()
        };
        if tokio::fs::try_exists(&path).await? {
            let data = tokio::fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&data)?;
            for p in snapshot.projects {
                store.projects.insert(p.id.clone(), p);
            }
            for sd in snapshot.deployments {
                let key = DeploymentKey::new(&sd.project_id, &sd.deployment);
                store.deployments.insert(key, sd.deployment);
            }
            info!(
                path = %path.display(),
                projects = store.projects.len(),
                deployments = store.deployments.len(),
                "Loaded deployment store"
            );
        }
        Ok(store)
    }

    /// Register or replace a project
    pub async fn upsert_project(&self, project: Project) -> Result<()> {
        self.projects.insert(project.id.clone(), project);
        self.persist().await
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    /// Apply `f` to an existing record under its shard lock
    async fn update(
        &self,
        project: &ProjectId,
        d: &ApplicationDeployment,
        f: impl FnOnce(&mut ApplicationDeployment),
    ) -> Result<()> {
        {
            let key = DeploymentKey::new(project, d);
            let Some(mut stored) = self.deployments.get_mut(&key) else {
                return Err(WatcherError::Store(format!(
                    "unknown deployment {} of {} started at {}",
                    d.name, d.application_id, d.started_at
                )));
            };
            f(&mut stored);
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let mut projects: Vec<Project> = self.projects.iter().map(|p| p.value().clone()).collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        let mut deployments: Vec<StoredDeployment> = self
            .deployments
            .iter()
            .map(|e| StoredDeployment {
                project_id: e.key().project.clone(),
                deployment: e.value().clone(),
            })
            .collect();
        deployments.sort_by(|a, b| {
            (&a.project_id, &a.deployment.application_id, a.deployment.started_at).cmp(&(
                &b.project_id,
                &b.deployment.application_id,
                b.deployment.started_at,
            ))
        });
        let json = serde_json::to_vec_pretty(&Snapshot {
            projects,
            deployments,
        })?;
        write_atomic(path, &json).await?;
        debug!(path = %path.display(), "Deployment store persisted");
        Ok(())
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn get_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.iter().map(|p| p.value().clone()).collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }

    async fn get_deployments(&self, project: &ProjectId) -> Result<Vec<ApplicationDeployment>> {
        let mut res: Vec<ApplicationDeployment> = self
            .deployments
            .iter()
            .filter(|e| &e.key().project == project)
            .map(|e| e.value().clone())
            .collect();
        res.sort_by(|a, b| {
            (&a.application_id, a.started_at).cmp(&(&b.application_id, b.started_at))
        });
        Ok(res)
    }

    async fn save_deployment(&self, project: &ProjectId, d: &ApplicationDeployment) -> Result<()> {
        self.deployments
            .entry(DeploymentKey::new(project, d))
            .and_modify(|stored| {
                stored.finished_at = d.finished_at;
                stored.details = d.details.clone();
            })
            .or_insert_with(|| d.clone());
        self.persist().await
    }

    async fn save_metrics_snapshot(
        &self,
        project: &ProjectId,
        d: &ApplicationDeployment,
    ) -> Result<()> {
        self.update(project, d, |stored| {
            stored.metrics_snapshot = d.metrics_snapshot.clone()
        })
        .await
    }

    async fn save_notifications(
        &self,
        project: &ProjectId,
        d: &ApplicationDeployment,
    ) -> Result<()> {
        self.update(project, d, |stored| {
            stored.notifications = d.notifications.clone()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApplicationKind, DeploymentNotifications, DeploymentState, MetricsSnapshot};
    use tempfile::TempDir;

    fn deployment(name: &str, started_at: i64) -> ApplicationDeployment {
        let id = ApplicationId::new("default", ApplicationKind::Deployment, "api");
        ApplicationDeployment::new(id, name, Time(started_at))
    }

    #[tokio::test]
    async fn test_save_deployment_upserts() {
        let store = MemoryStore::new();
        let p = ProjectId::from("p1");
        let mut d = deployment("api-2", 100);
        store.save_deployment(&p, &d).await.unwrap();
        d.finished_at = Some(Time(160));
        store.save_deployment(&p, &d).await.unwrap();
        store.save_deployment(&p, &d).await.unwrap();

        let stored = store.get_deployments(&p).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].finished_at, Some(Time(160)));
    }

    #[tokio::test]
    async fn test_upsert_keeps_snapshot() {
        let store = MemoryStore::new();
        let p = ProjectId::from("p1");
        let mut d = deployment("api-2", 100);
        store.save_deployment(&p, &d).await.unwrap();
        d.metrics_snapshot = Some(MetricsSnapshot::default());
        store.save_metrics_snapshot(&p, &d).await.unwrap();

        let mut again = deployment("api-2", 100);
        again.finished_at = Some(Time(200));
        store.save_deployment(&p, &again).await.unwrap();

        let stored = store.get_deployments(&p).await.unwrap();
        assert!(stored[0].metrics_snapshot.is_some());
        assert_eq!(stored[0].finished_at, Some(Time(200)));
    }

    #[tokio::test]
    async fn test_deployments_are_ordered_and_scoped() {
        let store = MemoryStore::new();
        let p1 = ProjectId::from("p1");
        store.save_deployment(&p1, &deployment("api-3", 300)).await.unwrap();
        store.save_deployment(&p1, &deployment("api-2", 100)).await.unwrap();
        store
            .save_deployment(&ProjectId::from("p2"), &deployment("api-9", 50))
            .await
            .unwrap();

        let names: Vec<String> = store
            .get_deployments(&p1)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["api-2", "api-3"]);
    }

    #[tokio::test]
    async fn test_update_of_unknown_deployment_fails() {
        let store = MemoryStore::new();
        let err = store
            .save_notifications(&ProjectId::from("p1"), &deployment("api-2", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, WatcherError::Store(_)));
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("deployments.json");
        let p = ProjectId::from("p1");
        {
            let store = MemoryStore::with_persistence(&path).await.unwrap();
            store.upsert_project(Project::new("p1", "prod")).await.unwrap();
            let mut d = deployment("api-2", 100);
            store.save_deployment(&p, &d).await.unwrap();
            d.notifications = Some(DeploymentNotifications {
                state: DeploymentState::Summary,
                ..Default::default()
            });
            store.save_notifications(&p, &d).await.unwrap();
        }

        let store = MemoryStore::with_persistence(&path).await.unwrap();
        assert_eq!(store.get_projects().await.unwrap().len(), 1);
        let stored = store.get_deployments(&p).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].notifications.as_ref().map(|n| n.state),
            Some(DeploymentState::Summary)
        );
    }
}
