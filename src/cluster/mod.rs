//! Cluster adapters
//!
//! Implementations of [`crate::domain::ports::ClusterAdminClient`] and the
//! registry that picks one from configuration.

pub mod config;
pub mod http;
pub mod memory;
pub mod registry;
pub mod snapshot;

pub use config::ClusterConfig;
pub use http::HttpAdminClient;
pub use memory::{CallKind, Fault, InMemoryCluster};
pub use registry::ClientRegistry;
