//! Watcher configuration
//!
//! Read from an optional TOML file (`deploy-watcher.toml`, or the path in
//! `WATCHER_CONFIG`), overridden by `WATCHER_*` environment variables.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use watcher_lib::deployments::SnapshotSettings;
use watcher_lib::model::Project;
use watcher_lib::timeseries::Duration;

const DEFAULT_CONFIG_FILE: &str = "deploy-watcher.toml";

/// Watcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherSettings {
    /// Name attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Time between watcher passes in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Root of the per-project metrics cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// JSON file the deployment store is persisted to; in-memory only if unset
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_snapshot_shift")]
    pub snapshot_shift_secs: i64,

    #[serde(default = "default_snapshot_window")]
    pub snapshot_window_secs: i64,

    /// Bound of a single notification send in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    #[serde(default)]
    pub projects: Vec<Project>,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "deploy-watcher".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    60
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_snapshot_shift() -> i64 {
    60
}

fn default_snapshot_window() -> i64 {
    1800
}

fn default_send_timeout() -> u64 {
    30
}

impl WatcherSettings {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("WATCHER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from `path` (if it exists) and environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("WATCHER").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.send_timeout_secs)
    }

    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings {
            shift: Duration(self.snapshot_shift_secs),
            window: Duration(self.snapshot_window_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watcher_lib::model::DEFAULT_REFRESH_INTERVAL;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WatcherSettings::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(settings.api_port, 8080);
        assert_eq!(settings.interval(), std::time::Duration::from_secs(60));
        assert_eq!(settings.cache_dir, PathBuf::from("./cache"));
        assert!(settings.store_path.is_none());
        assert_eq!(settings.snapshot_settings(), SnapshotSettings::default());
        assert_eq!(settings.send_timeout(), std::time::Duration::from_secs(30));
        assert!(settings.projects.is_empty());
    }

    #[test]
    fn test_projects_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy-watcher.toml");
        std::fs::write(
            &path,
            r#"
interval_secs = 15
store_path = "/var/lib/deploy-watcher/store.json"

[[projects]]
id = "p1"
name = "production"
notify_of_deployments = true
channels = ["log"]

[[projects]]
id = "p2"
name = "staging"
refresh_interval = 15
"#,
        )
        .unwrap();

        let settings = WatcherSettings::load_from(&path).unwrap();
        assert_eq!(settings.interval_secs, 15);
        assert_eq!(
            settings.store_path.as_deref(),
            Some(Path::new("/var/lib/deploy-watcher/store.json"))
        );
        assert_eq!(settings.projects.len(), 2);
        assert!(settings.projects[0].notifies("log"));
        assert_eq!(settings.projects[0].refresh_interval, DEFAULT_REFRESH_INTERVAL);
        assert_eq!(settings.projects[1].refresh_interval, Duration(15));
    }
}
