//! In-Memory Cluster Adapter
//!
//! A self-contained cluster that keeps collections, backups and async jobs
//! in process memory. Used for standalone runs and for exercising the
//! orchestrators: faults can be injected per call kind and recent calls
//! are recorded.

use crate::cluster::config::ClusterConfig;
use crate::cluster::snapshot;
use crate::domain::model::{CollectionRef, FailureDetail};
use crate::domain::ports::{
    AdminResponse, AsyncSubmission, ClusterAdminClient, RawJobStatus, SnapshotRequest,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info};

/// Location key used when neither the request nor the config names one
const DEFAULT_LOCATION: &str = "default";

/// Calls kept in the call log; older ones are dropped
pub const CALL_LOG_CAPACITY: usize = 1024;

/// Async jobs tracked at once; the oldest is forgotten beyond this
pub const MAX_TRACKED_JOBS: usize = 1024;

/// Status polls a finished job keeps answering before it is forgotten
pub const TERMINAL_POLLS_RETAINED: u32 = 16;

// =============================================================================
// Calls and Faults
// =============================================================================

/// Kind of admin call, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CollectionExists,
    Delete,
    Backup,
    SubmitBackup,
    Restore,
    SubmitRestore,
    Optimize,
    QueryStatus,
}

/// A recorded admin call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCall {
    pub kind: CallKind,
    /// Collection name, or request id for status queries
    pub target: String,
}

/// Fault returned instead of the normal result of a call
#[derive(Debug, Clone)]
pub enum Fault {
    /// The cluster answers with this response
    Respond(AdminResponse),
    /// The call fails before reaching the cluster
    Unreachable(String),
}

struct InjectedFault {
    kind: CallKind,
    fault: Fault,
    persistent: bool,
}

// =============================================================================
// Cluster State
// =============================================================================

#[derive(Debug, Clone)]
struct CollectionState {
    shard_count: u32,
    replication_factor: u32,
    optimized: bool,
}

#[derive(Debug, Clone)]
struct BackupRecord {
    collection: String,
}

#[derive(Debug, Clone)]
struct JobRecord {
    seq: u64,
    polls: u32,
    result: AdminResponse,
}

#[derive(Default)]
struct ClusterState {
    collections: BTreeMap<String, CollectionState>,
    /// location -> backup name -> record
    backups: BTreeMap<String, BTreeMap<String, BackupRecord>>,
    jobs: HashMap<String, JobRecord>,
    faults: Vec<InjectedFault>,
    calls: VecDeque<AdminCall>,
    next_request: u64,
}

impl ClusterState {
    fn take_fault(&mut self, kind: CallKind) -> Option<Fault> {
        let index = self.faults.iter().position(|f| f.kind == kind)?;
        if self.faults[index].persistent {
            Some(self.faults[index].fault.clone())
        } else {
            Some(self.faults.remove(index).fault)
        }
    }

    /// Record the call and return an injected fault, if any
    fn enter(&mut self, kind: CallKind, target: &str) -> Option<Fault> {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(AdminCall {
            kind,
            target: target.to_string(),
        });
        self.take_fault(kind)
    }

    fn next_request_id(&mut self, operation: &str) -> String {
        self.next_request += 1;
        format!("{}-{:08}", operation, self.next_request)
    }

    fn track_job(&mut self, request_id: String, result: AdminResponse) {
        if self.jobs.len() >= MAX_TRACKED_JOBS {
            let oldest = self
                .jobs
                .iter()
                .min_by_key(|(_, job)| job.seq)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                debug!("Forgetting async job {}", id);
                self.jobs.remove(&id);
            }
        }

        let seq = self.next_request;
        self.jobs.insert(
            request_id,
            JobRecord {
                seq,
                polls: 0,
                result,
            },
        );
    }
}

// =============================================================================
// In-Memory Cluster
// =============================================================================

/// Cluster admin client backed by process memory
pub struct InMemoryCluster {
    config: ClusterConfig,
    state: Mutex<ClusterState>,
}

impl InMemoryCluster {
    /// Create an empty in-memory cluster
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ClusterState::default()),
        }
    }

    /// Create a collection with the configured layout
    pub fn create_collection(&self, name: &str) {
        let mut state = self.state.lock();
        state.collections.insert(
            name.to_string(),
            CollectionState {
                shard_count: self.config.shard_count,
                replication_factor: self.config.replication_factor,
                optimized: false,
            },
        );
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.state.lock().collections.contains_key(name)
    }

    /// Whether the collection has been optimized since it was created
    pub fn is_optimized(&self, name: &str) -> bool {
        self.state
            .lock()
            .collections
            .get(name)
            .map(|c| c.optimized)
            .unwrap_or(false)
    }

    /// Shard and replica layout of a collection
    pub fn layout(&self, name: &str) -> Option<(u32, u32)> {
        self.state
            .lock()
            .collections
            .get(name)
            .map(|c| (c.shard_count, c.replication_factor))
    }

    /// Register an existing backup at a location
    pub fn add_backup(&self, location: Option<&str>, name: &str, collection: &str) {
        let key = self.location_key(location);
        self.state
            .lock()
            .backups
            .entry(key)
            .or_default()
            .insert(
                name.to_string(),
                BackupRecord {
                    collection: collection.to_string(),
                },
            );
    }

    /// Names of the backups stored at a location
    pub fn backup_names(&self, location: Option<&str>) -> Vec<String> {
        let key = self.location_key(location);
        self.state
            .lock()
            .backups
            .get(&key)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fail the next call of `kind` with `fault`
    pub fn inject(&self, kind: CallKind, fault: Fault) {
        self.state.lock().faults.push(InjectedFault {
            kind,
            fault,
            persistent: false,
        });
    }

    /// Fail every call of `kind` with `fault`
    pub fn inject_always(&self, kind: CallKind, fault: Fault) {
        self.state.lock().faults.push(InjectedFault {
            kind,
            fault,
            persistent: true,
        });
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<AdminCall> {
        self.state.lock().calls.iter().cloned().collect()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    fn location_key(&self, requested: Option<&str>) -> String {
        self.config
            .location_for(requested)
            .unwrap_or(DEFAULT_LOCATION)
            .to_string()
    }

    fn apply_fault(fault: Fault) -> Result<AdminResponse> {
        match fault {
            Fault::Respond(response) => Ok(response),
            Fault::Unreachable(reason) => Err(Error::Connection(reason)),
        }
    }

    fn perform_backup(&self, state: &mut ClusterState, request: &SnapshotRequest) -> AdminResponse {
        let collection = request.collection.as_str();
        if !state.collections.contains_key(collection) {
            return AdminResponse::failed(
                400,
                vec![FailureDetail::new("Collection not found", collection)],
            );
        }

        let name = request
            .backup_name
            .clone()
            .unwrap_or_else(|| snapshot::default_backup_name(chrono::Utc::now()));
        let location = self.location_key(request.location.as_deref());

        let backups = state.backups.entry(location.clone()).or_default();
        if backups.contains_key(&name) {
            return AdminResponse::failed(
                400,
                vec![FailureDetail::new("Backup already exists", name)],
            );
        }
        backups.insert(
            name.clone(),
            BackupRecord {
                collection: collection.to_string(),
            },
        );

        info!("Backed up {} to {}/{}", collection, location, name);
        AdminResponse::ok().with_message(name)
    }

    fn perform_restore(&self, state: &mut ClusterState, request: &SnapshotRequest) -> AdminResponse {
        let collection = request.collection.as_str();
        let location = self.location_key(request.location.as_deref());
        let available = state.backups.get(&location);

        let name = match &request.backup_name {
            Some(name) => Some(name.clone()),
            None => available.and_then(|b| snapshot::latest_snapshot(b.keys())),
        };

        let record = name
            .as_ref()
            .and_then(|n| available.and_then(|b| b.get(n)).map(|r| (n.clone(), r.clone())));

        let Some((name, record)) = record else {
            return AdminResponse::failed(
                400,
                vec![FailureDetail::new(
                    "Backup not found",
                    format!("{}/{}", location, name.unwrap_or_default()),
                )],
            );
        };

        if state.collections.contains_key(collection) {
            return AdminResponse::failed(
                400,
                vec![FailureDetail::new("Collection already exists", collection)],
            );
        }

        state.collections.insert(
            collection.to_string(),
            CollectionState {
                shard_count: self.config.shard_count,
                replication_factor: self.config.replication_factor,
                optimized: false,
            },
        );

        info!(
            "Restored {} from {}/{} (taken from {})",
            collection, location, name, record.collection
        );
        AdminResponse::ok().with_message(name)
    }

    fn submit(
        &self,
        kind: CallKind,
        request: &SnapshotRequest,
        operation: &str,
        perform: impl FnOnce(&Self, &mut ClusterState, &SnapshotRequest) -> AdminResponse,
    ) -> Result<AsyncSubmission> {
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(kind, request.collection.as_str()) {
            return Self::apply_fault(fault).map(AsyncSubmission::Rejected);
        }

        // The work happens now; the status only reveals it over later polls
        let result = perform(self, &mut state, request);
        let request_id = state.next_request_id(operation);
        state.track_job(request_id.clone(), result);

        debug!("Queued {} job {}", operation, request_id);
        Ok(AsyncSubmission::Accepted { request_id })
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new(ClusterConfig {
            client_kind: "memory".to_string(),
            ..ClusterConfig::default()
        })
    }
}

#[async_trait]
impl ClusterAdminClient for InMemoryCluster {
    async fn collection_exists(&self, collection: &CollectionRef) -> Result<bool> {
        let mut state = self.state.lock();
        match state.enter(CallKind::CollectionExists, collection.as_str()) {
            Some(Fault::Unreachable(reason)) => Err(Error::Connection(reason)),
            Some(Fault::Respond(response)) => Ok(response.is_success()),
            None => Ok(state.collections.contains_key(collection.as_str())),
        }
    }

    async fn delete_collection(&self, collection: &CollectionRef) -> Result<AdminResponse> {
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(CallKind::Delete, collection.as_str()) {
            return Self::apply_fault(fault);
        }

        if state.collections.remove(collection.as_str()).is_some() {
            info!("Deleted collection {}", collection);
            Ok(AdminResponse::ok())
        } else {
            Ok(AdminResponse::failed(
                400,
                vec![FailureDetail::new("Collection not found", collection.as_str())],
            ))
        }
    }

    async fn backup_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse> {
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(CallKind::Backup, request.collection.as_str()) {
            return Self::apply_fault(fault);
        }
        Ok(self.perform_backup(&mut state, request))
    }

    async fn submit_backup(&self, request: &SnapshotRequest) -> Result<AsyncSubmission> {
        self.submit(CallKind::SubmitBackup, request, "backup", Self::perform_backup)
    }

    async fn restore_collection(&self, request: &SnapshotRequest) -> Result<AdminResponse> {
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(CallKind::Restore, request.collection.as_str()) {
            return Self::apply_fault(fault);
        }
        Ok(self.perform_restore(&mut state, request))
    }

    async fn submit_restore(&self, request: &SnapshotRequest) -> Result<AsyncSubmission> {
        self.submit(CallKind::SubmitRestore, request, "restore", Self::perform_restore)
    }

    async fn optimize_collection(&self, collection: &CollectionRef) -> Result<AdminResponse> {
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(CallKind::Optimize, collection.as_str()) {
            return Self::apply_fault(fault);
        }

        match state.collections.get_mut(collection.as_str()) {
            Some(c) => {
                c.optimized = true;
                Ok(AdminResponse::ok())
            }
            None => Ok(AdminResponse::failed(
                404,
                vec![FailureDetail::new("Collection not found", collection.as_str())],
            )),
        }
    }

    async fn query_async_status(&self, request_id: &str) -> Result<RawJobStatus> {
        let polls_to_finish = self.config.simulated_job_polls;
        let mut state = self.state.lock();
        if let Some(fault) = state.enter(CallKind::QueryStatus, request_id) {
            return match fault {
                Fault::Unreachable(reason) => Err(Error::Connection(reason)),
                Fault::Respond(response) => {
                    Ok(RawJobStatus::new("failed").with_errors(response.errors))
                }
            };
        }

        let Some(job) = state.jobs.get_mut(request_id) else {
            return Ok(RawJobStatus::new("notfound"));
        };

        job.polls = job.polls.saturating_add(1);
        let expired = job.polls >= polls_to_finish.saturating_add(TERMINAL_POLLS_RETAINED);
        let status = if job.polls >= polls_to_finish {
            if job.result.is_success() {
                RawJobStatus::new("completed")
            } else {
                RawJobStatus::new("failed").with_errors(job.result.errors.clone())
            }
        } else if job.polls == 1 {
            RawJobStatus::new("submitted")
        } else {
            RawJobStatus::new("running")
        };

        if expired {
            debug!("Async job {} reported its final state, forgetting it", request_id);
            state.jobs.remove(request_id);
        }

        Ok(status)
    }

    fn client_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(collection: &str) -> SnapshotRequest {
        SnapshotRequest {
            collection: CollectionRef::new(collection).unwrap(),
            location: None,
            backup_name: None,
        }
    }

    #[tokio::test]
    async fn test_backup_then_restore_roundtrip() {
        let cluster = InMemoryCluster::default();
        cluster.create_collection("catalog");

        let response = cluster.backup_collection(&request("catalog")).await.unwrap();
        assert!(response.is_success());
        let name = response.message.unwrap();
        assert!(name.starts_with(snapshot::SNAPSHOT_PREFIX));
        assert_eq!(cluster.backup_names(None), vec![name.clone()]);

        let catalog = CollectionRef::new("catalog").unwrap();
        assert!(cluster.delete_collection(&catalog).await.unwrap().is_success());
        assert!(!cluster.has_collection("catalog"));

        let response = cluster.restore_collection(&request("catalog")).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.message.as_deref(), Some(name.as_str()));
        assert_eq!(cluster.layout("catalog"), Some((2, 2)));
    }

    #[tokio::test]
    async fn test_restore_picks_latest_snapshot() {
        let cluster = InMemoryCluster::default();
        cluster.add_backup(None, "snapshot.20200101000000000", "catalog");
        cluster.add_backup(None, "snapshot.20210101000000000", "catalog");
        cluster.add_backup(None, "manual", "catalog");

        let response = cluster.restore_collection(&request("catalog")).await.unwrap();
        assert_eq!(
            response.message.as_deref(),
            Some("snapshot.20210101000000000")
        );
    }

    #[tokio::test]
    async fn test_restore_without_backup_fails() {
        let cluster = InMemoryCluster::default();
        let response = cluster.restore_collection(&request("catalog")).await.unwrap();
        assert!(!response.is_success());
        assert_eq!(response.errors[0].name, "Backup not found");
    }

    #[tokio::test]
    async fn test_async_job_progression() {
        let cluster = InMemoryCluster::default();
        cluster.create_collection("catalog");

        let submission = cluster.submit_backup(&request("catalog")).await.unwrap();
        let AsyncSubmission::Accepted { request_id } = submission else {
            panic!("backup was not accepted");
        };

        let states: Vec<String> = {
            let mut states = Vec::new();
            for _ in 0..4 {
                states.push(cluster.query_async_status(&request_id).await.unwrap().state);
            }
            states
        };
        assert_eq!(states, vec!["submitted", "running", "completed", "completed"]);

        let unknown = cluster.query_async_status("nope").await.unwrap();
        assert_eq!(unknown.state, "notfound");
    }

    #[tokio::test]
    async fn test_failed_async_job_reports_errors() {
        let cluster = InMemoryCluster::default();

        let submission = cluster.submit_backup(&request("missing")).await.unwrap();
        let AsyncSubmission::Accepted { request_id } = submission else {
            panic!("backup was not accepted");
        };

        let mut last = RawJobStatus::new("submitted");
        for _ in 0..3 {
            last = cluster.query_async_status(&request_id).await.unwrap();
        }
        assert_eq!(last.state, "failed");
        assert_eq!(
            last.errors,
            vec![FailureDetail::new("Collection not found", "missing")]
        );
    }

    #[tokio::test]
    async fn test_finished_job_is_forgotten_after_retention() {
        let cluster = InMemoryCluster::default();
        cluster.create_collection("catalog");

        let submission = cluster.submit_backup(&request("catalog")).await.unwrap();
        let AsyncSubmission::Accepted { request_id } = submission else {
            panic!("backup was not accepted");
        };

        let answered = 3 + TERMINAL_POLLS_RETAINED;
        let mut last = RawJobStatus::new("submitted");
        for _ in 0..answered {
            last = cluster.query_async_status(&request_id).await.unwrap();
        }
        assert_eq!(last.state, "completed");

        let expired = cluster.query_async_status(&request_id).await.unwrap();
        assert_eq!(expired.state, "notfound");
    }

    #[tokio::test]
    async fn test_tracked_jobs_are_bounded() {
        let cluster = InMemoryCluster::default();

        let mut first = None;
        for _ in 0..=MAX_TRACKED_JOBS {
            let submission = cluster.submit_backup(&request("missing")).await.unwrap();
            let AsyncSubmission::Accepted { request_id } = submission else {
                panic!("backup was not accepted");
            };
            first.get_or_insert(request_id);
        }

        assert_eq!(cluster.state.lock().jobs.len(), MAX_TRACKED_JOBS);
        let oldest = cluster.query_async_status(&first.unwrap()).await.unwrap();
        assert_eq!(oldest.state, "notfound");
    }

    #[tokio::test]
    async fn test_call_log_keeps_most_recent_calls() {
        let cluster = InMemoryCluster::default();
        let catalog = CollectionRef::new("catalog").unwrap();

        for _ in 0..CALL_LOG_CAPACITY + 10 {
            cluster.collection_exists(&catalog).await.unwrap();
        }
        cluster.optimize_collection(&catalog).await.unwrap();

        let calls = cluster.calls();
        assert_eq!(calls.len(), CALL_LOG_CAPACITY);
        assert_eq!(calls.last().map(|c| c.kind), Some(CallKind::Optimize));
    }

    #[tokio::test]
    async fn test_fault_injection_and_call_log() {
        let cluster = InMemoryCluster::default();
        let catalog = CollectionRef::new("catalog").unwrap();
        cluster.inject(CallKind::CollectionExists, Fault::Unreachable("down".into()));

        assert!(cluster.collection_exists(&catalog).await.is_err());
        assert!(!cluster.collection_exists(&catalog).await.unwrap());

        cluster.inject_always(
            CallKind::Optimize,
            Fault::Respond(AdminResponse::failed(500, Vec::new())),
        );
        for _ in 0..2 {
            let response = cluster.optimize_collection(&catalog).await.unwrap();
            assert_eq!(response.status, 500);
        }

        assert_eq!(cluster.call_count(CallKind::CollectionExists), 2);
        assert_eq!(cluster.call_count(CallKind::Optimize), 2);
        assert_eq!(cluster.calls()[0].target, "catalog");
    }
}
