//! Cluster connection configuration
//!
//! Replaces process-wide properties with one explicit struct handed to the
//! client constructors. Loadable from YAML; every field has a default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a cluster admin client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    /// Client implementation to construct (`http` or `memory`)
    pub client_kind: String,
    /// Base URL of the cluster, e.g. `http://solr:8983/solr`
    pub base_url: String,
    /// Shards created for a restored collection
    pub shard_count: u32,
    /// Replicas per shard for a restored collection
    pub replication_factor: u32,
    /// Upper bound of shards a single node may host
    pub max_shards_per_node: u32,
    /// Location used when a spec does not name one
    pub default_location: Option<String>,
    /// Per-request timeout in seconds; sync calls may run for minutes
    pub request_timeout_secs: u64,
    /// Status polls an in-memory async job takes to finish
    pub simulated_job_polls: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            client_kind: "http".to_string(),
            base_url: "http://localhost:8983/solr".to_string(),
            shard_count: 2,
            replication_factor: 2,
            max_shards_per_node: 2,
            default_location: None,
            request_timeout_secs: 600,
            simulated_job_polls: 3,
        }
    }
}

impl ClusterConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ClusterConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make every cluster call fail
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Configuration("base URL must not be empty".into()));
        }
        if self.shard_count == 0 {
            return Err(Error::Configuration("shard count must be at least 1".into()));
        }
        if self.replication_factor == 0 {
            return Err(Error::Configuration(
                "replication factor must be at least 1".into(),
            ));
        }
        if self.max_shards_per_node == 0 {
            return Err(Error::Configuration(
                "max shards per node must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Location to use for a request, falling back to the configured default
    pub fn location_for<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .filter(|l| !l.trim().is_empty())
            .or(self.default_location.as_deref())
    }
}
