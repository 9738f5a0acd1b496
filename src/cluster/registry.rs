//! Client registry
//!
//! Maps a configured client kind to a constructor. Lookups walk the
//! registrations in order and the first matching key wins, so the
//! selection stays deterministic when aliases overlap.

use crate::cluster::config::ClusterConfig;
use crate::cluster::http::HttpAdminClient;
use crate::cluster::memory::InMemoryCluster;
use crate::domain::ports::ClusterAdminClientRef;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Constructor for a cluster admin client
pub type ClientConstructor = fn(ClusterConfig) -> Result<ClusterAdminClientRef>;

/// Ordered set of client constructors
pub struct ClientRegistry {
    entries: Vec<(String, ClientConstructor)>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a constructor under `key`; earlier registrations win
    pub fn register(&mut self, key: impl Into<String>, constructor: ClientConstructor) -> &mut Self {
        self.entries.push((key.into().to_lowercase(), constructor));
        self
    }

    /// Registered keys, in lookup order
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Build the client named by `config.client_kind`
    pub fn create(&self, config: ClusterConfig) -> Result<ClusterAdminClientRef> {
        let kind = config.client_kind.trim().to_lowercase();
        let (_, constructor) = self
            .entries
            .iter()
            .find(|(key, _)| *key == kind)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown client kind '{}', expected one of: {}",
                    config.client_kind,
                    self.keys().join(", ")
                ))
            })?;

        debug!("Creating {} cluster admin client", kind);
        constructor(config)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("http", |config| Ok(Arc::new(HttpAdminClient::new(config)?)))
            .register("memory", |config| Ok(Arc::new(InMemoryCluster::new(config))));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str) -> ClusterConfig {
        ClusterConfig {
            client_kind: kind.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_registrations() {
        let registry = ClientRegistry::default();
        assert_eq!(registry.keys(), vec!["http", "memory"]);

        assert_eq!(registry.create(config("memory")).unwrap().client_name(), "memory");
        assert_eq!(registry.create(config(" HTTP ")).unwrap().client_name(), "http");
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let err = ClientRegistry::default()
            .create(config("zookeeper"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = ClientRegistry::empty();
        registry
            .register("memory", |config| Ok(Arc::new(InMemoryCluster::new(config))))
            .register("memory", |_| Err(Error::Internal("shadowed".into())));

        assert!(registry.create(config("memory")).is_ok());
    }
}
