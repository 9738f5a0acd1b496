//! Domain Ports - Trait definitions at the cluster and reporting boundaries
//!
//! The orchestrators talk to the cluster only through [`ClusterAdminClient`]
//! and announce results only through [`JobOutcomeReporter`]. Adapters in
//! [`crate::cluster`] and [`crate::orchestration::report`] implement them.

use crate::domain::model::{BackupSpec, CollectionRef, FailureDetail, RestoreSpec};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Admin Requests/Responses
// =============================================================================

/// Parameters shared by backup and restore calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub collection: CollectionRef,
    pub location: Option<String>,
    pub backup_name: Option<String>,
}

impl From<&BackupSpec> for SnapshotRequest {
    fn from(spec: &BackupSpec) -> Self {
        Self {
            collection: spec.collection.clone(),
            location: spec.location.clone(),
            backup_name: spec.backup_name.clone(),
        }
    }
}

impl From<&RestoreSpec> for SnapshotRequest {
    fn from(spec: &RestoreSpec) -> Self {
        Self {
            collection: spec.collection.clone(),
            location: spec.location.clone(),
            backup_name: spec.backup_name.clone(),
        }
    }
}

/// Response to a synchronous admin call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    /// Status code from the response header; zero means success
    pub status: i32,
    /// Structured failure list, in the order the cluster reported it
    pub errors: Vec<FailureDetail>,
    /// Free-form message accompanying the response, if any
    pub message: Option<String>,
}

impl AdminResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(status: i32, errors: Vec<FailureDetail>) -> Self {
        Self {
            status,
            errors,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == 0 && self.errors.is_empty()
    }
}

/// Answer to an asynchronous issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncSubmission {
    /// The cluster queued the job under this id
    Accepted { request_id: String },
    /// The cluster refused to queue the job
    Rejected(AdminResponse),
}

/// Status payload as reported by the cluster, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobStatus {
    pub state: String,
    pub message: Option<String>,
    pub errors: Vec<FailureDetail>,
}

impl RawJobStatus {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            message: None,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<FailureDetail>) -> Self {
        self.errors = errors;
        self
    }
}

// =============================================================================
// Cluster Admin Client Port
// =============================================================================

/// Port for the cluster's collection administration API
///
/// `Err` means the call never produced a usable answer (transport or
/// protocol failure). A cluster that answered but refused is an `Ok` with a
/// non-success [`AdminResponse`].
#[async_trait]
pub trait ClusterAdminClient: Send + Sync {
    /// Check whether the collection is present
    async fn collection_exists(&self, collection: &CollectionRef) -> Result<bool>;

    /// Delete a collection
    async fn delete_collection(&self, collection: &CollectionRef) -> Result<AdminResponse>;

    /// Back up a collection and wait for the result
    async fn backup_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse>;

    /// Queue a backup and return its request id
    async fn submit_backup(&self, request: &SnapshotRequest) -> Result<AsyncSubmission>;

    /// Fill in whatever a restore request still lacks, such as the backup
    /// name, before anything on the cluster is touched
    async fn prepare_restore(&self, request: &SnapshotRequest) -> Result<SnapshotRequest> {
        Ok(request.clone())
    }

    /// Restore a collection and wait for the result
    async fn restore_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse>;

    /// Queue a restore and return its request id
    async fn submit_restore(&self, request: &SnapshotRequest) -> Result<AsyncSubmission>;

    /// Optimize (merge segments of) a collection
    async fn optimize_collection(&self, collection: &CollectionRef) -> Result<AdminResponse>;

    /// Look up an asynchronous request
    async fn query_async_status(&self, request_id: &str) -> Result<RawJobStatus>;

    /// Get client name
    fn client_name(&self) -> &str;
}

// =============================================================================
// Job Outcome Reporter Port
// =============================================================================

/// Port receiving the human-readable result of each orchestrator call
pub trait JobOutcomeReporter: Send + Sync {
    fn report_success(&self, message: &str);

    fn report_error(&self, message: &str);
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterAdminClientRef = Arc<dyn ClusterAdminClient>;
pub type JobOutcomeReporterRef = Arc<dyn JobOutcomeReporter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_response_success() {
        assert!(AdminResponse::ok().is_success());
        assert!(!AdminResponse::failed(500, Vec::new()).is_success());
        assert!(!AdminResponse::failed(0, vec![FailureDetail::new("n", "v")]).is_success());
    }

    #[test]
    fn test_snapshot_request_from_specs() {
        let collection = CollectionRef::new("catalog").unwrap();
        let backup = BackupSpec::new(collection.clone())
            .with_location("/backups")
            .with_backup_name("nightly");
        let request = SnapshotRequest::from(&backup);
        assert_eq!(request.collection, collection);
        assert_eq!(request.location.as_deref(), Some("/backups"));
        assert_eq!(request.backup_name.as_deref(), Some("nightly"));

        let restore = RestoreSpec::new(collection).forced(true);
        let request = SnapshotRequest::from(&restore);
        assert!(request.location.is_none());
        assert!(request.backup_name.is_none());
    }
}
