//! Collection Backup Orchestrator
//!
//! Backup and restore workflows for collections of a distributed search
//! cluster, driven through the cluster's administration API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │              CLI (collection-backup)  /  REST API (axum)             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌────────────────┐  │
//! │  │ BackupOrchestrator │  │ RestoreOrchestrator│  │   JobWatcher   │  │
//! │  └─────────┬──────────┘  └─────────┬──────────┘  └───────┬────────┘  │
//! │            └───── invocation · outcome · status · report ┘           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                   ClusterAdminClient (port)                          │
//! │  ┌─────────────────────────────┐  ┌───────────────────────────────┐  │
//! │  │  HttpAdminClient (reqwest)  │  │  InMemoryCluster (standalone) │  │
//! │  └─────────────────────────────┘  └───────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`orchestration`]: Backup and restore workflows and their shared parts
//! - [`cluster`]: Cluster admin clients, configuration and snapshot naming
//! - [`watch`]: Caller-side polling of async jobs
//! - [`api`]: REST API server
//! - [`metrics`]: Prometheus counters
//! - [`domain`]: Core domain types and ports
//! - [`error`]: Error types and handling

pub mod api;
pub mod cluster;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod orchestration;
pub mod watch;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig};

pub use cluster::{ClientRegistry, ClusterConfig, HttpAdminClient, InMemoryCluster};

pub use domain::model::{
    AsyncJobStatus, BackupSpec, CollectionRef, FailureDetail, JobState, OperationMode,
    OperationOutcome, RestoreSpec, DEFAULT_COLLECTION,
};

pub use domain::ports::{
    AdminResponse, AsyncSubmission, ClusterAdminClient, ClusterAdminClientRef,
    JobOutcomeReporter, JobOutcomeReporterRef, RawJobStatus, SnapshotRequest,
};

pub use error::{Error, ErrorKind, Result};

pub use metrics::OperationMetrics;

pub use orchestration::{
    BackupOrchestrator, ConsoleReporter, Invocation, JobRequest, MemoryReporter, Operation,
    RestoreOrchestrator, TracingReporter,
};

pub use watch::JobWatcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
