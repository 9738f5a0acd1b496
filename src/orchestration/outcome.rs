//! Outcome aggregation
//!
//! Turns admin responses and async submissions into [`OperationOutcome`]s,
//! carrying the cluster's failure list over in order.

use crate::domain::model::{CollectionRef, OperationOutcome};
use crate::domain::ports::{AdminResponse, AsyncSubmission};
use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};

/// Which workflow produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Backup,
    Restore,
}

impl Operation {
    /// Lowercase label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Backup => "backup",
            Operation::Restore => "restore",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Backup => write!(f, "Backup"),
            Operation::Restore => write!(f, "Restore"),
        }
    }
}

/// Outcome of a synchronous admin call
pub fn from_response(
    operation: Operation,
    collection: &CollectionRef,
    response: AdminResponse,
) -> OperationOutcome {
    if response.is_success() {
        return OperationOutcome::succeeded(format!(
            "{} of [{}] complete.",
            operation, collection
        ));
    }

    let mut message = format!(
        "{} of [{}] failed with status {}.",
        operation, collection, response.status
    );
    if let Some(detail) = response.message.as_deref().filter(|m| !m.is_empty()) {
        message.push(' ');
        message.push_str(detail);
    }

    OperationOutcome::failed(ErrorKind::ClusterOperationFailed, message).with_errors(response.errors)
}

/// Outcome of an asynchronous issuance
pub fn from_submission(
    operation: Operation,
    collection: &CollectionRef,
    submission: AsyncSubmission,
) -> OperationOutcome {
    match submission {
        AsyncSubmission::Accepted { request_id } => {
            let message = format!("{} request Id: {}", operation, request_id);
            OperationOutcome::accepted(request_id, message)
        }
        AsyncSubmission::Rejected(response) => {
            let mut outcome = from_response(operation, collection, response);
            // A refusal reported with status 0 is still a refusal
            if outcome.success {
                outcome = OperationOutcome::failed(
                    ErrorKind::ClusterOperationFailed,
                    format!("{} of [{}] was not accepted.", operation, collection),
                );
            }
            outcome
        }
    }
}

/// Outcome of a call that never got a usable answer from the cluster
pub fn from_error(operation: Operation, collection: &CollectionRef, err: &Error) -> OperationOutcome {
    OperationOutcome::failed(
        err.kind(),
        format!("{} of [{}] failed. {}", operation, collection, err.cause()),
    )
}
