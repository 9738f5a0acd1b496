//! REST API Handlers
//!
//! Exposes the backup and restore orchestrators over HTTP. Request bodies
//! are [`JobRequest`]s; responses are the [`OperationOutcome`] itself with
//! an HTTP status derived from its error kind.

use crate::domain::model::{BackupSpec, OperationOutcome, RestoreSpec};
use crate::domain::ports::ClusterAdminClientRef;
use crate::error::ErrorKind;
use crate::metrics::OperationMetrics;
use crate::orchestration::invocation::JobRequest;
use crate::orchestration::outcome::Operation;
use crate::orchestration::report::TracingReporter;
use crate::orchestration::{BackupOrchestrator, RestoreOrchestrator};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters of a status lookup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    /// Workflow the request id belongs to; only affects the message
    #[serde(default)]
    pub operation: Option<Operation>,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    client: ClusterAdminClientRef,
    metrics: OperationMetrics,
}

impl RestRouter {
    pub fn new(client: ClusterAdminClientRef, metrics: OperationMetrics) -> Self {
        Self { client, metrics }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let reporter = Arc::new(TracingReporter);
        let state = AppState {
            client: self.client,
            backups: BackupOrchestrator::with_reporter(reporter.clone()),
            restores: RestoreOrchestrator::with_reporter(reporter),
            metrics: self.metrics,
        };

        Router::new()
            .route("/v1/backups", post(create_backup))
            .route("/v1/restores", post(create_restore))
            .route("/v1/requests/:id", get(get_request_status))
            .route("/health", get(health_check))
            .route("/metrics", get(render_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    client: ClusterAdminClientRef,
    backups: BackupOrchestrator,
    restores: RestoreOrchestrator,
    metrics: OperationMetrics,
}

/// HTTP status for an outcome
pub fn status_code_for(outcome: &OperationOutcome) -> StatusCode {
    if outcome.success {
        return StatusCode::OK;
    }
    match outcome.kind {
        Some(ErrorKind::InvalidArgument) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::PreconditionFailed) => StatusCode::CONFLICT,
        Some(ErrorKind::ClusterOperationFailed) | Some(ErrorKind::TransportFailure) | None => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn respond(outcome: OperationOutcome) -> axum::response::Response {
    (status_code_for(&outcome), Json(outcome)).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_backup(
    State(state): State<AppState>,
    Json(request): Json<JobRequest<BackupSpec>>,
) -> impl IntoResponse {
    info!("Backup requested for {}", request.spec.collection);

    let outcome = state.backups.run(request, state.client.as_ref()).await;
    state.metrics.record(Operation::Backup, &outcome);
    respond(outcome)
}

async fn create_restore(
    State(state): State<AppState>,
    Json(request): Json<JobRequest<RestoreSpec>>,
) -> impl IntoResponse {
    info!("Restore requested for {}", request.spec.collection);

    let outcome = state.restores.run(request, state.client.as_ref()).await;
    state.metrics.record(Operation::Restore, &outcome);
    respond(outcome)
}

async fn get_request_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let operation = query.operation.unwrap_or(Operation::Restore);
    let client = state.client.as_ref();

    let outcome = match operation {
        Operation::Backup => state.backups.status(&id, client).await,
        Operation::Restore => state.restores.status(&id, client).await,
    };
    state.metrics.record(operation, &outcome);
    respond(outcome)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse {
                    error: "metrics_unavailable".into(),
                    message: e.to_string(),
                    details: None,
                }),
            )
                .into_response()
        }
    }
}
