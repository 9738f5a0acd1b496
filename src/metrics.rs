//! Operation metrics
//!
//! Prometheus counters for orchestrator outcomes, kept in a private
//! registry so several instances can coexist in one process (tests, an
//! embedded server).

use crate::domain::model::{JobState, OperationOutcome};
use crate::error::Result;
use crate::orchestration::outcome::Operation;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for backup and restore calls
#[derive(Clone)]
pub struct OperationMetrics {
    registry: Registry,
    operations: IntCounterVec,
    status_queries: IntCounterVec,
}

impl OperationMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new(
                "collection_backup_operations_total",
                "Backup and restore calls by outcome",
            ),
            &["operation", "result"],
        )?;
        let status_queries = IntCounterVec::new(
            Opts::new(
                "collection_backup_status_queries_total",
                "Async status queries by observed job state",
            ),
            &["state"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(status_queries.clone()))?;

        Ok(Self {
            registry,
            operations,
            status_queries,
        })
    }

    /// Count one orchestrator outcome
    pub fn record(&self, operation: Operation, outcome: &OperationOutcome) {
        let result = match (&outcome.kind, outcome.success) {
            (_, true) => "success".to_string(),
            (Some(kind), false) => kind.to_string(),
            (None, false) => "failure".to_string(),
        };
        self.operations
            .with_label_values(&[operation.label(), result.as_str()])
            .inc();

        if let Some(status) = &outcome.job_status {
            self.record_status(status.state);
        }
    }

    fn record_status(&self, state: JobState) {
        self.status_queries
            .with_label_values(&[state.to_string().as_str()])
            .inc();
    }

    /// Count of outcomes for an operation/result pair
    pub fn operation_count(&self, operation: Operation, result: &str) -> u64 {
        self.operations
            .with_label_values(&[operation.label(), result])
            .get()
    }

    /// Render all counters in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut output = Vec::new();
        TextEncoder::new().encode(&families, &mut output)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}
