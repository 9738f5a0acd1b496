//! Orchestration
//!
//! Backup and restore workflows plus the pieces they share: invocation
//! validation, outcome aggregation, status translation and reporting.

pub mod backup;
pub mod invocation;
pub mod outcome;
pub mod report;
pub mod restore;
pub mod status;

pub use backup::BackupOrchestrator;
pub use invocation::{Invocation, JobRequest, JobSpec};
pub use outcome::Operation;
pub use report::{ConsoleReporter, MemoryReporter, TracingReporter};
pub use restore::RestoreOrchestrator;
