//! Async job status translation
//!
//! Single-shot mapping from the cluster's raw request-status payload to an
//! [`AsyncJobStatus`]. Looping, sleeping and deadlines are the caller's
//! business (see [`crate::watch`]).

use crate::domain::model::{AsyncJobStatus, JobState, OperationOutcome};
use crate::domain::ports::{ClusterAdminClient, RawJobStatus};
use crate::error::{Error, ErrorKind, Result};
use crate::orchestration::outcome::Operation;
use tracing::{debug, warn};

/// Parse a raw state string as reported by the cluster
pub fn parse_state(raw: &str) -> Option<JobState> {
    let normalized: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();

    match normalized.as_str() {
        "submitted" => Some(JobState::Submitted),
        "running" => Some(JobState::Running),
        "completed" => Some(JobState::Completed),
        "failed" => Some(JobState::Failed),
        "notfound" => Some(JobState::NotFound),
        _ => None,
    }
}

/// Translate a raw status payload into a normalized snapshot
pub fn translate(request_id: &str, raw: RawJobStatus) -> Result<AsyncJobStatus> {
    let state = parse_state(&raw.state).ok_or_else(|| {
        Error::Protocol(format!(
            "unrecognized state '{}' for request {}",
            raw.state, request_id
        ))
    })?;

    // Only a failed job carries its failure list forward
    let errors = if state == JobState::Failed {
        raw.errors
    } else {
        Vec::new()
    };

    Ok(AsyncJobStatus {
        request_id: request_id.to_string(),
        state,
        errors,
        message: raw.message,
    })
}

/// Query the cluster once and translate the answer
pub async fn fetch(client: &dyn ClusterAdminClient, request_id: &str) -> Result<AsyncJobStatus> {
    let request_id = request_id.trim();
    if request_id.is_empty() {
        return Err(Error::InvalidArgument(
            "a status query requires a request id".into(),
        ));
    }

    let raw = client.query_async_status(request_id).await?;
    debug!("Raw status for request {}: {}", request_id, raw.state);
    translate(request_id, raw)
}

/// Build the outcome of a status query
pub fn outcome_for(operation: Operation, status: AsyncJobStatus) -> OperationOutcome {
    let message = format!(
        "{} request [{}] status: {}",
        operation, status.request_id, status.state
    );

    if status.state.is_failure() {
        warn!("{}", message);
        OperationOutcome::failed(ErrorKind::ClusterOperationFailed, message)
            .with_errors(status.errors.clone())
            .with_job_status(status)
    } else {
        OperationOutcome::succeeded(message).with_job_status(status)
    }
}

/// Status-query path shared by both orchestrators
pub async fn query(
    operation: Operation,
    client: &dyn ClusterAdminClient,
    request_id: &str,
) -> OperationOutcome {
    match fetch(client, request_id).await {
        Ok(status) => outcome_for(operation, status),
        Err(e) => {
            warn!("Status query for request {} failed: {}", request_id, e);
            OperationOutcome::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::FailureDetail;

    #[test]
    fn test_parse_state_variants() {
        assert_eq!(parse_state("submitted"), Some(JobState::Submitted));
        assert_eq!(parse_state("RUNNING"), Some(JobState::Running));
        assert_eq!(parse_state(" completed "), Some(JobState::Completed));
        assert_eq!(parse_state("failed"), Some(JobState::Failed));
        assert_eq!(parse_state("notfound"), Some(JobState::NotFound));
        assert_eq!(parse_state("not_found"), Some(JobState::NotFound));
        assert_eq!(parse_state("Not Found"), Some(JobState::NotFound));
        assert_eq!(parse_state("exploded"), None);
        assert_eq!(parse_state(""), None);
    }

    #[test]
    fn test_translate_keeps_errors_only_for_failed_jobs() {
        let errors = vec![FailureDetail::new("shard1", "disk full")];

        let failed = translate("r1", RawJobStatus::new("failed").with_errors(errors.clone())).unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.errors, errors);

        let running = translate("r1", RawJobStatus::new("running").with_errors(errors)).unwrap();
        assert_eq!(running.state, JobState::Running);
        assert!(running.errors.is_empty());
    }

    #[test]
    fn test_translate_unknown_state_is_protocol_error() {
        let err = translate("r1", RawJobStatus::new("paused")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_outcome_for_failed_status() {
        let status = AsyncJobStatus {
            request_id: "r9".into(),
            state: JobState::Failed,
            errors: vec![FailureDetail::new("n1", "v1")],
            message: None,
        };

        let outcome = outcome_for(Operation::Restore, status);
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(ErrorKind::ClusterOperationFailed));
        assert_eq!(outcome.errors, vec![FailureDetail::new("n1", "v1")]);
        assert_eq!(outcome.message, "Restore request [r9] status: failed");
        assert_eq!(outcome.job_status.unwrap().state, JobState::Failed);
    }

    #[test]
    fn test_outcome_for_running_status_is_success() {
        let status = AsyncJobStatus {
            request_id: "r2".into(),
            state: JobState::Running,
            errors: Vec::new(),
            message: None,
        };

        let outcome = outcome_for(Operation::Backup, status);
        assert!(outcome.success);
        assert!(outcome.request_id.is_none());
        assert_eq!(outcome.job_status.unwrap().state, JobState::Running);
    }
}
