//! Backup Orchestrator

use crate::domain::model::{BackupSpec, OperationMode, OperationOutcome};
use crate::domain::ports::{ClusterAdminClient, JobOutcomeReporterRef, SnapshotRequest};
use crate::orchestration::invocation::{Invocation, JobRequest};
use crate::orchestration::outcome::{self, Operation};
use crate::orchestration::{report, status};
use tracing::{info, warn};

/// Backup workflow driver
///
/// Backups never touch the live collection, so there is no existence check
/// and no follow-up step.
#[derive(Default, Clone)]
pub struct BackupOrchestrator {
    reporter: Option<JobOutcomeReporterRef>,
}

impl BackupOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(reporter: JobOutcomeReporterRef) -> Self {
        Self {
            reporter: Some(reporter),
        }
    }

    /// Validate a call, run it, and report the outcome
    pub async fn run(
        &self,
        request: JobRequest<BackupSpec>,
        client: &dyn ClusterAdminClient,
    ) -> OperationOutcome {
        let outcome = match request.resolve() {
            Ok(Invocation::Issue(spec)) => self.execute(&spec, client).await,
            Ok(Invocation::Status { request_id }) => {
                status::query(Operation::Backup, client, &request_id).await
            }
            Err(e) => {
                warn!("Rejected backup invocation: {}", e);
                OperationOutcome::from_error(&e)
            }
        };

        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    pub async fn backup(&self, spec: &BackupSpec, client: &dyn ClusterAdminClient) -> OperationOutcome {
        let outcome = self.execute(spec, client).await;
        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    pub async fn status(&self, request_id: &str, client: &dyn ClusterAdminClient) -> OperationOutcome {
        let outcome = status::query(Operation::Backup, client, request_id).await;
        report::deliver(self.reporter.as_deref(), &outcome);
        outcome
    }

    async fn execute(&self, spec: &BackupSpec, client: &dyn ClusterAdminClient) -> OperationOutcome {
        let collection = &spec.collection;
        let request = SnapshotRequest::from(spec);

        info!(
            "Backing up collection [{}] to [{}] ({} mode)",
            collection,
            request.location.as_deref().unwrap_or("<default>"),
            spec.mode
        );

        let result = match spec.mode {
            OperationMode::Sync => client
                .backup_collection(&request)
                .await
                .map(|r| outcome::from_response(Operation::Backup, collection, r)),
            OperationMode::Async => client
                .submit_backup(&request)
                .await
                .map(|s| outcome::from_submission(Operation::Backup, collection, s)),
        };

        result.unwrap_or_else(|e| {
            warn!("Backup of {} did not reach the cluster: {}", collection, e);
            outcome::from_error(Operation::Backup, collection, &e)
        })
    }
}
