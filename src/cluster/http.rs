//! HTTP Collections API Adapter
//!
//! Drives a SolrCloud-style cluster through its `/admin/collections`
//! endpoint. Async issuance attaches a locally generated request id
//! (`async=<id>`) that is later looked up with `REQUESTSTATUS`.

use crate::cluster::config::ClusterConfig;
use crate::cluster::snapshot;
use crate::domain::model::{CollectionRef, FailureDetail};
use crate::domain::ports::{
    AdminResponse, AsyncSubmission, ClusterAdminClient, RawJobStatus, SnapshotRequest,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest slice of an unparseable body quoted in an error
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotAction {
    Backup,
    Restore,
}

impl SnapshotAction {
    fn as_param(&self) -> &'static str {
        match self {
            SnapshotAction::Backup => "BACKUP",
            SnapshotAction::Restore => "RESTORE",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SnapshotAction::Backup => "backup",
            SnapshotAction::Restore => "restore",
        }
    }
}

// =============================================================================
// HTTP Admin Client
// =============================================================================

/// Cluster admin client speaking the Collections API over HTTP
pub struct HttpAdminClient {
    config: ClusterConfig,
    http: reqwest::Client,
    request_counter: AtomicU64,
}

impl HttpAdminClient {
    /// Create a new HTTP admin client
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http,
            request_counter: AtomicU64::new(0),
        })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn collections_url(&self) -> String {
        format!("{}/admin/collections", self.base_url())
    }

    /// Issue a GET and parse the JSON body, whatever the HTTP status
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        debug!("Sending request to {} {:?}", url, params);

        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("wt", "json")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|_| {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            Error::Protocol(format!("HTTP {} with non-JSON body: {}", status, excerpt))
        })
    }

    async fn admin(&self, params: &[(&str, String)]) -> Result<Value> {
        self.get_json(&self.collections_url(), params).await
    }

    fn next_request_id(&self, action: SnapshotAction, collection: &CollectionRef) -> String {
        let seq = self.request_counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}-{}",
            action.label(),
            collection,
            chrono::Utc::now().format("%Y%m%d%H%M%S%3f"),
            seq
        )
    }

    /// Backup name to send; generated for backups, resolved for restores
    fn snapshot_name(&self, action: SnapshotAction, request: &SnapshotRequest) -> Result<String> {
        if let Some(name) = request.backup_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Ok(name.to_string());
        }

        match action {
            SnapshotAction::Backup => Ok(snapshot::default_backup_name(chrono::Utc::now())),
            SnapshotAction::Restore => {
                let location = self
                    .config
                    .location_for(request.location.as_deref())
                    .ok_or_else(|| {
                        Error::InvalidArgument(
                            "a restore without a backup name requires a location".into(),
                        )
                    })?;

                snapshot::resolve_in_directory(Path::new(location))?.ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "no snapshot.<timestamp> backup found in {}",
                        location
                    ))
                })
            }
        }
    }

    fn snapshot_params(
        &self,
        action: SnapshotAction,
        request: &SnapshotRequest,
    ) -> Result<Vec<(&'static str, String)>> {
        let name = self.snapshot_name(action, request)?;

        let mut params = vec![
            ("action", action.as_param().to_string()),
            ("name", name),
            ("collection", request.collection.to_string()),
        ];

        if let Some(location) = self.config.location_for(request.location.as_deref()) {
            params.push(("location", location.to_string()));
        }

        if action == SnapshotAction::Restore {
            params.push((
                "replicationFactor",
                self.config.replication_factor.to_string(),
            ));
            params.push((
                "maxShardsPerNode",
                self.config.max_shards_per_node.to_string(),
            ));
        }

        Ok(params)
    }

    async fn run_snapshot(
        &self,
        action: SnapshotAction,
        request: &SnapshotRequest,
    ) -> Result<AdminResponse> {
        let params = self.snapshot_params(action, request)?;
        info!(
            "Running {} of {} via {}",
            action.label(),
            request.collection,
            self.base_url()
        );
        let body = self.admin(&params).await?;
        parse_admin_response(&body)
    }

    async fn submit_snapshot(
        &self,
        action: SnapshotAction,
        request: &SnapshotRequest,
    ) -> Result<AsyncSubmission> {
        let mut params = self.snapshot_params(action, request)?;
        let request_id = self.next_request_id(action, &request.collection);
        params.push(("async", request_id.clone()));

        info!(
            "Submitting async {} of {} as {}",
            action.label(),
            request.collection,
            request_id
        );

        let body = self.admin(&params).await?;
        let response = parse_admin_response(&body)?;
        if !response.is_success() {
            warn!("Cluster refused async {}: status {}", action.label(), response.status);
            return Ok(AsyncSubmission::Rejected(response));
        }

        let request_id = body
            .get("requestid")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or(request_id);

        Ok(AsyncSubmission::Accepted { request_id })
    }
}

#[async_trait]
impl ClusterAdminClient for HttpAdminClient {
    async fn collection_exists(&self, collection: &CollectionRef) -> Result<bool> {
        let body = self.admin(&[("action", "LIST".to_string())]).await?;
        let response = parse_admin_response(&body)?;
        if !response.is_success() {
            return Err(Error::ClusterOperation {
                operation: "list".into(),
                collection: collection.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        let collections = body
            .get("collections")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Protocol("LIST response without collections".into()))?;

        Ok(collections
            .iter()
            .filter_map(Value::as_str)
            .any(|name| name == collection.as_str()))
    }

    async fn delete_collection(&self, collection: &CollectionRef) -> Result<AdminResponse> {
        info!("Deleting collection {}", collection);
        let body = self
            .admin(&[
                ("action", "DELETE".to_string()),
                ("name", collection.to_string()),
            ])
            .await?;
        parse_admin_response(&body)
    }

    async fn backup_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse> {
        self.run_snapshot(SnapshotAction::Backup, request).await
    }

    async fn submit_backup(&self, request: &SnapshotRequest) -> Result<AsyncSubmission> {
        self.submit_snapshot(SnapshotAction::Backup, request).await
    }

    async fn prepare_restore(&self, request: &SnapshotRequest) -> Result<SnapshotRequest> {
        let name = self.snapshot_name(SnapshotAction::Restore, request)?;
        Ok(SnapshotRequest {
            backup_name: Some(name),
            ..request.clone()
        })
    }

    async fn restore_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse> {
        self.run_snapshot(SnapshotAction::Restore, request).await
    }

    async fn submit_restore(&self, request: &SnapshotRequest) -> Result<AsyncSubmission> {
        self.submit_snapshot(SnapshotAction::Restore, request).await
    }

    async fn optimize_collection(&self, collection: &CollectionRef) -> Result<AdminResponse> {
        let url = format!("{}/{}/update", self.base_url(), collection);
        let body = self
            .get_json(
                &url,
                &[
                    ("optimize", "true".to_string()),
                    ("waitSearcher", "true".to_string()),
                ],
            )
            .await?;
        parse_admin_response(&body)
    }

    async fn query_async_status(&self, request_id: &str) -> Result<RawJobStatus> {
        let body = self
            .admin(&[
                ("action", "REQUESTSTATUS".to_string()),
                ("requestid", request_id.to_string()),
            ])
            .await?;
        parse_request_status(&body)
    }

    fn client_name(&self) -> &str {
        "http"
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a failure list in any of the shapes the cluster emits
///
/// Accepts an ordered object, an array of `[name, value]` pairs, or a flat
/// `[name1, value1, name2, value2, ...]` array.
pub fn parse_failures(value: Option<&Value>) -> Vec<FailureDetail> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, v)| FailureDetail::new(name.clone(), value_text(v)))
            .collect(),
        Some(Value::Array(items)) => {
            let paired = items
                .iter()
                .all(|i| i.as_array().map(|a| a.len() == 2).unwrap_or(false));
            if paired {
                items
                    .iter()
                    .filter_map(Value::as_array)
                    .map(|pair| FailureDetail::new(value_text(&pair[0]), value_text(&pair[1])))
                    .collect()
            } else {
                items
                    .chunks(2)
                    .map(|chunk| {
                        let value = chunk.get(1).map(value_text).unwrap_or_default();
                        FailureDetail::new(value_text(&chunk[0]), value)
                    })
                    .collect()
            }
        }
        _ => Vec::new(),
    }
}

/// Parse a synchronous admin response body
pub fn parse_admin_response(body: &Value) -> Result<AdminResponse> {
    let status = body
        .pointer("/responseHeader/status")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Protocol("response without responseHeader.status".into()))?;

    let errors = parse_failures(body.get("failure"));
    let message = body
        .pointer("/error/msg")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(AdminResponse {
        status: i32::try_from(status)
            .map_err(|_| Error::Protocol(format!("status {} out of range", status)))?,
        errors,
        message,
    })
}

/// Parse a `REQUESTSTATUS` response body
pub fn parse_request_status(body: &Value) -> Result<RawJobStatus> {
    let state = body
        .pointer("/status/state")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol("REQUESTSTATUS response without status.state".into()))?;

    let mut errors = parse_failures(body.get("failure"));
    if let Some(msg) = body.pointer("/exception/msg").and_then(Value::as_str) {
        errors.push(FailureDetail::new("exception", msg));
    }

    Ok(RawJobStatus {
        state: state.to_string(),
        message: body
            .pointer("/status/msg")
            .and_then(Value::as_str)
            .map(String::from),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path as AxumPath, Query};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_parse_failures_shapes() {
        let expected = vec![
            FailureDetail::new("n2", "v2"),
            FailureDetail::new("n1", "v1"),
        ];

        let object = json!({"n2": "v2", "n1": "v1"});
        assert_eq!(parse_failures(Some(&object)), expected);

        let pairs = json!([["n2", "v2"], ["n1", "v1"]]);
        assert_eq!(parse_failures(Some(&pairs)), expected);

        let flat = json!(["n2", "v2", "n1", "v1"]);
        assert_eq!(parse_failures(Some(&flat)), expected);

        assert!(parse_failures(None).is_empty());
        assert!(parse_failures(Some(&json!("oops"))).is_empty());
    }

    #[test]
    fn test_parse_admin_response() {
        let ok = parse_admin_response(&json!({"responseHeader": {"status": 0, "QTime": 12}})).unwrap();
        assert!(ok.is_success());

        let failed = parse_admin_response(&json!({
            "responseHeader": {"status": 500},
            "failure": {"node1:8983_solr": "could not find backup"}
        }))
        .unwrap();
        assert_eq!(failed.status, 500);
        assert_eq!(
            failed.errors,
            vec![FailureDetail::new("node1:8983_solr", "could not find backup")]
        );

        let error_only = parse_admin_response(&json!({
            "responseHeader": {"status": 400},
            "error": {"msg": "Collection not found: bad", "code": 400}
        }))
        .unwrap();
        assert!(error_only.errors.is_empty());
        assert_eq!(error_only.message.as_deref(), Some("Collection not found: bad"));

        let err = parse_admin_response(&json!({"collections": []})).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_parse_request_status() {
        let raw = parse_request_status(&json!({
            "responseHeader": {"status": 0},
            "status": {"state": "failed", "msg": "found [r1] in failed tasks"},
            "exception": {"msg": "Could not restore core", "rspCode": 500}
        }))
        .unwrap();
        assert_eq!(raw.state, "failed");
        assert_eq!(raw.message.as_deref(), Some("found [r1] in failed tasks"));
        assert_eq!(
            raw.errors,
            vec![FailureDetail::new("exception", "Could not restore core")]
        );

        assert!(parse_request_status(&json!({"status": {}})).is_err());
    }

    #[test]
    fn test_error_only_response_reported_once() {
        use crate::orchestration::outcome::{self, Operation};
        use crate::orchestration::report;

        let response = parse_admin_response(&json!({
            "responseHeader": {"status": 400},
            "error": {"msg": "Collection not found: bad", "code": 400}
        }))
        .unwrap();
        let outcome = outcome::from_response(
            Operation::Restore,
            &CollectionRef::new("bad").unwrap(),
            response,
        );

        let text = report::render(&outcome);
        assert_eq!(text.matches("Collection not found: bad").count(), 1, "{}", text);
        assert_eq!(
            text,
            "Restore of [bad] failed with status 400. Collection not found: bad"
        );
    }

    // -------------------------------------------------------------------------
    // In-process fake cluster
    // -------------------------------------------------------------------------

    async fn collections_api(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let action = params.get("action").map(String::as_str).unwrap_or_default();
        let body = match action {
            "LIST" => json!({"responseHeader": {"status": 0}, "collections": ["catalog"]}),
            "DELETE" => json!({"responseHeader": {"status": 0}}),
            "BACKUP" | "RESTORE" => {
                let collection = params.get("collection").cloned().unwrap_or_default();
                if collection == "bad" {
                    json!({
                        "responseHeader": {"status": 400},
                        "failure": [["Collection not found", "bad"]]
                    })
                } else if let Some(id) = params.get("async") {
                    json!({"responseHeader": {"status": 0}, "requestid": id})
                } else if action == "RESTORE" && params.get("replicationFactor").is_none() {
                    json!({"responseHeader": {"status": 400}, "error": {"msg": "missing replicationFactor"}})
                } else {
                    json!({"responseHeader": {"status": 0}})
                }
            }
            "REQUESTSTATUS" => json!({
                "responseHeader": {"status": 0},
                "status": {"state": "completed", "msg": "found in completed tasks"}
            }),
            _ => json!({"responseHeader": {"status": 400}, "error": {"msg": "unknown action"}}),
        };
        Json(body)
    }

    async fn update_api(AxumPath(collection): AxumPath<String>) -> Json<Value> {
        if collection == "catalog" {
            Json(json!({"responseHeader": {"status": 0}}))
        } else {
            Json(json!({"responseHeader": {"status": 404}, "error": {"msg": "no such core"}}))
        }
    }

    async fn spawn_fake_cluster() -> String {
        let app = Router::new()
            .route("/solr/admin/collections", get(collections_api))
            .route("/solr/:collection/update", get(update_api))
            .route("/broken/admin/collections", get(|| async { "<html>gateway</html>" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> HttpAdminClient {
        HttpAdminClient::new(ClusterConfig {
            base_url,
            request_timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn request(collection: &str) -> SnapshotRequest {
        SnapshotRequest {
            collection: CollectionRef::new(collection).unwrap(),
            location: Some("/mnt/backups".into()),
            backup_name: Some("nightly".into()),
        }
    }

    #[tokio::test]
    async fn test_http_client_against_fake_cluster() {
        let root = spawn_fake_cluster().await;
        let client = client_for(format!("{}/solr", root));

        let catalog = CollectionRef::new("catalog").unwrap();
        assert!(client.collection_exists(&catalog).await.unwrap());
        assert!(!client
            .collection_exists(&CollectionRef::new("other").unwrap())
            .await
            .unwrap());

        assert!(client.delete_collection(&catalog).await.unwrap().is_success());
        assert!(client.backup_collection(&request("catalog")).await.unwrap().is_success());
        assert!(client.restore_collection(&request("catalog")).await.unwrap().is_success());
        assert!(client.optimize_collection(&catalog).await.unwrap().is_success());

        let failed = client.restore_collection(&request("bad")).await.unwrap();
        assert_eq!(
            failed.errors,
            vec![FailureDetail::new("Collection not found", "bad")]
        );
    }

    #[tokio::test]
    async fn test_http_client_async_issuance_and_status() {
        let root = spawn_fake_cluster().await;
        let client = client_for(format!("{}/solr/", root));

        let submission = client.submit_restore(&request("catalog")).await.unwrap();
        let AsyncSubmission::Accepted { request_id } = submission else {
            panic!("restore was not accepted");
        };
        assert!(request_id.starts_with("restore-catalog-"));

        let status = client.query_async_status(&request_id).await.unwrap();
        assert_eq!(status.state, "completed");

        let rejected = client.submit_backup(&request("bad")).await.unwrap();
        assert!(matches!(rejected, AsyncSubmission::Rejected(r) if r.status == 400));
    }

    #[tokio::test]
    async fn test_http_client_non_json_body_is_protocol_error() {
        let root = spawn_fake_cluster().await;
        let client = client_for(format!("{}/broken", root));

        let err = client
            .collection_exists(&CollectionRef::new("catalog").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_http_client_unreachable_cluster() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}/solr", addr));
        let err = client
            .collection_exists(&CollectionRef::new("catalog").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unresolvable_forced_restore_keeps_existing_collection() {
        use crate::domain::model::RestoreSpec;
        use crate::error::ErrorKind;
        use crate::orchestration::RestoreOrchestrator;
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        let deletes = Arc::new(AtomicUsize::new(0));
        let counter = deletes.clone();
        let app = Router::new().route(
            "/solr/admin/collections",
            get(move |query: Query<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    if query.get("action").map(String::as_str) == Some("DELETE") {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    collections_api(query).await
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = client_for(format!("http://{}/solr", addr));
        let spec = RestoreSpec::new(CollectionRef::new("catalog").unwrap()).forced(true);

        let outcome = RestoreOrchestrator::new().restore(&spec, &client).await;

        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(ErrorKind::InvalidArgument));
        assert!(outcome.message.contains("requires a location"), "{}", outcome.message);
        assert_eq!(deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prepare_restore_fills_in_latest_backup_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("snapshot.20240101000000000")).unwrap();

        let client = client_for("http://localhost:8983/solr".into());
        let request = SnapshotRequest {
            collection: CollectionRef::new("catalog").unwrap(),
            location: Some(dir.path().to_string_lossy().into_owned()),
            backup_name: None,
        };

        let prepared = client.prepare_restore(&request).await.unwrap();
        assert_eq!(prepared.backup_name.as_deref(), Some("snapshot.20240101000000000"));
        assert_eq!(prepared.location, request.location);

        let named = client.prepare_restore(&self::request("catalog")).await.unwrap();
        assert_eq!(named.backup_name.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_restore_name_resolved_from_shared_mount() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("snapshot.20240101000000000")).unwrap();
        std::fs::create_dir(dir.path().join("snapshot.20240202000000000")).unwrap();

        let client = client_for("http://localhost:8983/solr".into());
        let request = SnapshotRequest {
            collection: CollectionRef::new("catalog").unwrap(),
            location: Some(dir.path().to_string_lossy().into_owned()),
            backup_name: None,
        };

        let params = client
            .snapshot_params(SnapshotAction::Restore, &request)
            .unwrap();
        assert!(params.contains(&("name", "snapshot.20240202000000000".to_string())));
        assert!(params.contains(&("replicationFactor", "2".to_string())));
        assert!(params.contains(&("maxShardsPerNode", "2".to_string())));

        let missing = SnapshotRequest {
            location: None,
            ..request
        };
        let err = client
            .snapshot_params(SnapshotAction::Restore, &missing)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
