//! Monitored projects

use crate::timeseries::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default step of worlds built for a project
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

/// A monitored cluster with its own metrics cache and notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Scrape interval of the project's metrics; used as the world step
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: Duration,
    #[serde(default)]
    pub notify_of_deployments: bool,
    /// Notification channels that receive deployment events
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId(id.into()),
            name: name.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            notify_of_deployments: false,
            channels: Vec::new(),
        }
    }

    pub fn notifies(&self, channel: &str) -> bool {
        self.notify_of_deployments && self.channels.iter().any(|c| c == channel)
    }
}
