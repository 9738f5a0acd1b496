//! Error types for the collection backup orchestrator
//!
//! Provides a single structured error type for the cluster clients, the
//! configuration layer and the caller-side job watcher. The orchestrators
//! never let these escape: they are folded into an
//! [`OperationOutcome`](crate::domain::OperationOutcome) tagged with an
//! [`ErrorKind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the orchestrator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Invocation Errors
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Collection already exists: {collection}")]
    CollectionExists { collection: String },

    // =========================================================================
    // Cluster Errors
    // =========================================================================
    #[error("Cluster operation failed: {operation} on {collection}: {reason}")]
    ClusterOperation {
        operation: String,
        collection: String,
        reason: String,
    },

    #[error("Cluster unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Cluster connection error: {0}")]
    Connection(String),

    #[error("Unexpected cluster response: {0}")]
    Protocol(String),

    #[error("Timed out waiting for request {request_id} after {elapsed}")]
    Timeout { request_id: String, elapsed: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Failure category reported on a failed outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Mutually exclusive or missing arguments; the cluster was never contacted
    InvalidArgument,
    /// Target collection exists and the restore was not forced
    PreconditionFailed,
    /// The administration API reported a non-success status
    ClusterOperationFailed,
    /// The cluster could not be reached or answered with garbage
    TransportFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid-argument"),
            ErrorKind::PreconditionFailed => write!(f, "precondition-failed"),
            ErrorKind::ClusterOperationFailed => write!(f, "cluster-operation-failed"),
            ErrorKind::TransportFailure => write!(f, "transport-failure"),
        }
    }
}

impl Error {
    /// Map this error onto the outcome taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Configuration(_) => ErrorKind::InvalidArgument,

            Error::CollectionExists { .. } => ErrorKind::PreconditionFailed,

            Error::ClusterOperation { .. } | Error::Timeout { .. } => {
                ErrorKind::ClusterOperationFailed
            }

            // Anything that kept us from getting a usable answer
            Error::Transport(_)
            | Error::Connection(_)
            | Error::Protocol(_)
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::Io(_)
            | Error::Metrics(_)
            | Error::Internal(_) => ErrorKind::TransportFailure,
        }
    }

    /// Check if a caller may retry the same call
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Connection(_))
    }

    /// Message used when the error is folded into an outcome
    pub fn cause(&self) -> String {
        match self {
            Error::InvalidArgument(msg) | Error::Connection(msg) | Error::Protocol(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for the orchestrator
pub type Result<T> = std::result::Result<T, Error>;
