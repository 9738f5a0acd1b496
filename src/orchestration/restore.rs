//! Restore Orchestrator
//!
//! Drives a restore: request preparation, existence check, optional forced
//! deletion, the restore itself (sync or async), and for sync restores a
//! follow-up optimize. Every path ends in exactly one [`OperationOutcome`]
//! and one report.

use crate::domain::model::{OperationMode, OperationOutcome, RestoreSpec};
use crate::domain::ports::{ClusterAdminClient, JobOutcomeReporterRef, SnapshotRequest};
use crate::error::{Error, ErrorKind};
use crate::orchestration::invocation::{Invocation, JobRequest};
use crate::orchestration::outcome::{self, Operation};
use crate::orchestration::{report, status};
use tracing::{info, warn};

/// Message when the target exists and the restore is not forced
pub const COLLECTION_EXISTS_MESSAGE: &str = "collection already exists";

/// Prefix of the message when a forced deletion fails
pub const DELETE_FAILED_MESSAGE: &str = "unable to delete existing collection";

/// Restore workflow driver
#[derive(Default, Clone)]
pub struct RestoreOrchestrator {
    reporter: Option<JobOutcomeReporterRef>,
}

impl RestoreOrchestrator {
    /// Create an orchestrator that reports nowhere
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an orchestrator that reports each outcome to `reporter`
    pub fn with_reporter(reporter: JobOutcomeReporterRef) -> Self {
        Self {
            reporter: Some(reporter),
        }
    }

    /// Validate a call, run it, and report the outcome
    pub async fn run(
        &self,
        request: JobRequest<RestoreSpec>,
        client: &dyn ClusterAdminClient,
    ) -> OperationOutcome {
        let outcome = match request.resolve() {
            Ok(Invocation::Issue(spec)) => self.execute(&spec, client).await,
            Ok(Invocation::Status { request_id }) => {
                status::query(Operation::Restore, client, &request_id).await
            }
            Err(e) => {
                warn!("Rejected restore invocation: {}", e);
                OperationOutcome::from_error(&e)
            }
        };

        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    /// Issue a restore and report the outcome
    pub async fn restore(
        &self,
        spec: &RestoreSpec,
        client: &dyn ClusterAdminClient,
    ) -> OperationOutcome {
        let outcome = self.execute(spec, client).await;
        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    /// Query an earlier async restore once and report the outcome
    pub async fn status(&self, request_id: &str, client: &dyn ClusterAdminClient) -> OperationOutcome {
        let outcome = status::query(Operation::Restore, client, request_id).await;
        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    async fn execute(&self, spec: &RestoreSpec, client: &dyn ClusterAdminClient) -> OperationOutcome {
        let collection = &spec.collection;

        // Resolved up front so a bad request never costs the existing collection
        let request = match client.prepare_restore(&SnapshotRequest::from(spec)).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Restore request for {} is not usable: {}", collection, e);
                return outcome::from_error(Operation::Restore, collection, &e);
            }
        };

        let exists = match client.collection_exists(collection).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Existence check for {} failed: {}", collection, e);
                return outcome::from_error(Operation::Restore, collection, &e);
            }
        };

        if exists {
            if !spec.force {
                let refusal = Error::CollectionExists {
                    collection: collection.to_string(),
                };
                warn!("{}; restore is not forced", refusal);
                return OperationOutcome::failed(refusal.kind(), COLLECTION_EXISTS_MESSAGE);
            }

            info!("Deleting existing collection [{}] before restore", collection);
            match client.delete_collection(collection).await {
                Ok(response) if response.is_success() => {}
                Ok(response) => {
                    let mut message = format!("{} (status {})", DELETE_FAILED_MESSAGE, response.status);
                    if let Some(detail) = response.message.as_deref() {
                        message.push_str(": ");
                        message.push_str(detail);
                    }
                    return OperationOutcome::failed(ErrorKind::ClusterOperationFailed, message)
                        .with_errors(response.errors);
                }
                Err(e) => {
                    return OperationOutcome::failed(
                        e.kind(),
                        format!("{}: {}", DELETE_FAILED_MESSAGE, e.cause()),
                    );
                }
            }
        }

        info!(
            "Restoring collection [{}] from [{}] / [{}]",
            collection,
            request.location.as_deref().unwrap_or("<default>"),
            request.backup_name.as_deref().unwrap_or("<latest>")
        );

        match spec.mode {
            OperationMode::Async => match client.submit_restore(&request).await {
                Ok(submission) => outcome::from_submission(Operation::Restore, collection, submission),
                Err(e) => outcome::from_error(Operation::Restore, collection, &e),
            },
            OperationMode::Sync => {
                let response = match client.restore_collection(&request).await {
                    Ok(response) => response,
                    Err(e) => return outcome::from_error(Operation::Restore, collection, &e),
                };

                let mut outcome = outcome::from_response(Operation::Restore, collection, response);
                if outcome.success {
                    if let Some(warning) = optimize(client, spec).await {
                        outcome.message.push_str(" Warning: ");
                        outcome.message.push_str(&warning);
                    }
                }
                outcome
            }
        }
    }
}

/// Optimize a freshly restored collection; returns a warning on failure
async fn optimize(client: &dyn ClusterAdminClient, spec: &RestoreSpec) -> Option<String> {
    let collection = &spec.collection;
    info!("Optimizing of collection [{}] is in progress.", collection);

    match client.optimize_collection(collection).await {
        Ok(response) if response.is_success() => None,
        Ok(response) => {
            let warning = format!(
                "optimize of [{}] failed with status {}.",
                collection, response.status
            );
            warn!("{}", warning);
            Some(warning)
        }
        Err(e) => {
            let warning = format!("optimize of [{}] failed. {}", collection, e.cause());
            warn!("{}", warning);
            Some(warning)
        }
    }
}
