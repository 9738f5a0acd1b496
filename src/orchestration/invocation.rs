//! Invocation validation
//!
//! A single call either issues a new job or queries the status of an
//! earlier async job, never both. Raw arguments are resolved into an
//! [`Invocation`] before anything reaches the cluster.

use crate::domain::model::{BackupSpec, CollectionRef, OperationMode, RestoreSpec};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Common view over backup and restore specs
pub trait JobSpec {
    fn collection(&self) -> &CollectionRef;

    fn mode(&self) -> OperationMode;
}

impl JobSpec for BackupSpec {
    fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    fn mode(&self) -> OperationMode {
        self.mode
    }
}

impl JobSpec for RestoreSpec {
    fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    fn mode(&self) -> OperationMode {
        self.mode
    }
}

/// Raw arguments of one call, as given by a CLI or API caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest<S> {
    #[serde(flatten)]
    pub spec: S,
    /// Query the status of `request_id` instead of issuing a job
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl<S> JobRequest<S> {
    pub fn issue(spec: S) -> Self {
        Self {
            spec,
            status: false,
            request_id: None,
        }
    }

    pub fn status_of(spec: S, request_id: impl Into<String>) -> Self {
        Self {
            spec,
            status: true,
            request_id: Some(request_id.into()),
        }
    }
}

/// A validated call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation<S> {
    Issue(S),
    Status { request_id: String },
}

impl<S: JobSpec> JobRequest<S> {
    /// Check argument exclusivity and produce the invocation
    pub fn resolve(self) -> Result<Invocation<S>> {
        let request_id = self
            .request_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        if self.status {
            if self.spec.mode() == OperationMode::Async {
                return Err(Error::InvalidArgument(
                    "a status query cannot be combined with an asynchronous issuance".into(),
                ));
            }
            let request_id = request_id.ok_or_else(|| {
                Error::InvalidArgument("a status query requires a request id".into())
            })?;
            return Ok(Invocation::Status { request_id });
        }

        if request_id.is_some() {
            return Err(Error::InvalidArgument(
                "a request id is only accepted together with a status query".into(),
            ));
        }

        Ok(Invocation::Issue(self.spec))
    }
}
