//! Domain Model - Value types flowing through the orchestrators
//!
//! Specs are built once per invocation and consumed; outcomes and job
//! statuses are immutable snapshots handed back to the caller.

use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Collection used when a caller does not name one
pub const DEFAULT_COLLECTION: &str = "catalog";

// =============================================================================
// Collection Reference
// =============================================================================

/// Name of a collection (or core) in the cluster
///
/// Never empty; there is no way to build one from a blank name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionRef(String);

impl CollectionRef {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument(
                "collection name must not be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CollectionRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CollectionRef> for String {
    fn from(value: CollectionRef) -> Self {
        value.0
    }
}

impl std::fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Operation Specs
// =============================================================================

/// Whether the caller blocks for the result or tracks a request id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    #[default]
    Sync,
    Async,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Sync => write!(f, "sync"),
            OperationMode::Async => write!(f, "async"),
        }
    }
}

/// Backup of a single collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    pub collection: CollectionRef,
    /// Storage location; the configured shared location when absent
    #[serde(default)]
    pub location: Option<String>,
    /// Snapshot name; `snapshot.<timestamp>` when absent
    #[serde(default)]
    pub backup_name: Option<String>,
    #[serde(default)]
    pub mode: OperationMode,
}

impl BackupSpec {
    pub fn new(collection: CollectionRef) -> Self {
        Self {
            collection,
            location: None,
            backup_name: None,
            mode: OperationMode::Sync,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_backup_name(mut self, name: impl Into<String>) -> Self {
        self.backup_name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Restore of a single collection from a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    pub collection: CollectionRef,
    #[serde(default)]
    pub location: Option<String>,
    /// Snapshot name; the latest `snapshot.<timestamp>` at the location when absent
    #[serde(default)]
    pub backup_name: Option<String>,
    #[serde(default)]
    pub mode: OperationMode,
    /// Delete the collection first if it already exists
    #[serde(default)]
    pub force: bool,
}

impl RestoreSpec {
    pub fn new(collection: CollectionRef) -> Self {
        Self {
            collection,
            location: None,
            backup_name: None,
            mode: OperationMode::Sync,
            force: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_backup_name(mut self, name: impl Into<String>) -> Self {
        self.backup_name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

// =============================================================================
// Failure Details
// =============================================================================

/// One entry of a cluster's structured failure list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub name: String,
    pub value: String,
}

impl FailureDetail {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Async Job Status
// =============================================================================

/// Normalized state of an asynchronous cluster job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Running,
    Completed,
    Failed,
    NotFound,
}

impl JobState {
    /// Terminal states never change on later polls
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::NotFound)
    }

    /// Whether the state reports a problem with the job
    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Failed | JobState::NotFound)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::NotFound => write!(f, "notfound"),
        }
    }
}

/// Snapshot of an asynchronous job as of one status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncJobStatus {
    pub request_id: String,
    pub state: JobState,
    pub errors: Vec<FailureDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Operation Outcome
// =============================================================================

/// Result of one orchestrator call
///
/// Every failure path, including invalid invocations and transport errors,
/// produces one of these rather than an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub success: bool,
    /// Present iff an async issuance was accepted
    pub request_id: Option<String>,
    pub errors: Vec<FailureDetail>,
    pub message: String,
    /// Category of the failure; `None` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Filled in by status queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<AsyncJobStatus>,
}

impl OperationOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            request_id: None,
            errors: Vec::new(),
            message: message.into(),
            kind: None,
            job_status: None,
        }
    }

    pub fn accepted(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::succeeded(message)
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: None,
            errors: Vec::new(),
            message: message.into(),
            kind: Some(kind),
            job_status: None,
        }
    }

    /// Fold a client or validation error into a failed outcome
    pub fn from_error(err: &Error) -> Self {
        Self::failed(err.kind(), err.cause())
    }

    pub fn with_errors(mut self, errors: Vec<FailureDetail>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_job_status(mut self, status: AsyncJobStatus) -> Self {
        self.job_status = Some(status);
        self
    }
}
