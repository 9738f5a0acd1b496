//! Async job watcher
//!
//! Caller-side polling for async issuances: repeats the single-shot status
//! query until the job reaches a terminal state or the deadline passes.

use crate::domain::model::AsyncJobStatus;
use crate::domain::ports::ClusterAdminClient;
use crate::error::{Error, Result};
use crate::orchestration::status;
use backoff::ExponentialBackoffBuilder;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a poll has to be repeated
enum Pending {
    Running(AsyncJobStatus),
    Unreachable(Error),
}

/// Polls an async job until it is terminal
#[derive(Debug, Clone, Copy)]
pub struct JobWatcher {
    interval: Duration,
    timeout: Duration,
}

impl Default for JobWatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(3600))
    }
}

impl JobWatcher {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Wait for `request_id` to finish
    ///
    /// Returns the terminal status, which may be `Failed` or `NotFound`.
    /// Transient transport errors are retried; if the deadline passes while
    /// the cluster is still unreachable the wait ends in [`Error::Timeout`].
    /// Any other error ends the wait immediately.
    pub async fn wait(
        &self,
        client: &dyn ClusterAdminClient,
        request_id: &str,
    ) -> Result<AsyncJobStatus> {
        let started = Instant::now();
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.interval)
            .with_multiplier(1.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.interval)
            .with_max_elapsed_time(Some(self.timeout))
            .build();

        info!("Waiting for request {} to finish", request_id);

        let result = backoff::future::retry(policy, move || async move {
            match status::fetch(client, request_id).await {
                Ok(status) if status.state.is_terminal() => Ok(status),
                Ok(status) => {
                    debug!("Request {} is {}", request_id, status.state);
                    Err(backoff::Error::transient(Pending::Running(status)))
                }
                Err(e) if e.is_transient() => {
                    warn!("Status poll for {} failed, retrying: {}", request_id, e);
                    Err(backoff::Error::transient(Pending::Unreachable(e)))
                }
                Err(e) => Err(backoff::Error::permanent(Pending::Unreachable(e))),
            }
        })
        .await;

        match result {
            Ok(status) => {
                info!(
                    "Request {} finished as {} after {:?}",
                    request_id,
                    status.state,
                    started.elapsed()
                );
                Ok(status)
            }
            Err(Pending::Running(last)) => Err(Error::Timeout {
                request_id: last.request_id,
                elapsed: format!("{:?}", started.elapsed()),
            }),
            Err(Pending::Unreachable(e)) if e.is_transient() => {
                warn!("Gave up on request {}, last poll failed: {}", request_id, e);
                Err(Error::Timeout {
                    request_id: request_id.to_string(),
                    elapsed: format!("{:?}", started.elapsed()),
                })
            }
            Err(Pending::Unreachable(e)) => Err(e),
        }
    }
}
