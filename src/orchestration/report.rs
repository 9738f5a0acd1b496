//! Outcome reporting
//!
//! Renders outcomes into human-readable text and hands them to a
//! [`JobOutcomeReporter`], once per orchestrator call.

use crate::domain::model::{FailureDetail, OperationOutcome};
use crate::domain::ports::JobOutcomeReporter;
use parking_lot::Mutex;
use std::io::Write;
use tracing::{error, info};

/// Render a failure list, one numbered line per entry
pub fn render_errors(errors: &[FailureDetail]) -> Vec<String> {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. Error Name: {}; Error Value: {}", i + 1, e.name, e.value))
        .collect()
}

/// Full text of an outcome: the message followed by any error lines
pub fn render(outcome: &OperationOutcome) -> String {
    let mut lines = vec![outcome.message.clone()];
    lines.extend(render_errors(&outcome.errors));
    lines.join("\n")
}

/// Deliver the terminal outcome of a call
pub fn deliver(reporter: Option<&dyn JobOutcomeReporter>, outcome: &OperationOutcome) {
    let Some(reporter) = reporter else {
        return;
    };

    let text = render(outcome);
    if outcome.success {
        reporter.report_success(&text);
    } else {
        reporter.report_error(&text);
    }
}

// =============================================================================
// Reporters
// =============================================================================

/// Writes successes to stdout and errors to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl JobOutcomeReporter for ConsoleReporter {
    fn report_success(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", message);
    }

    fn report_error(&self, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", message);
    }
}

/// Emits outcomes as log events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl JobOutcomeReporter for TracingReporter {
    fn report_success(&self, message: &str) {
        info!(target: "outcome", "{}", message);
    }

    fn report_error(&self, message: &str) {
        error!(target: "outcome", "{}", message);
    }
}

/// A reported message and whether it was a success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedMessage {
    pub success: bool,
    pub text: String,
}

/// Keeps every reported message in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<ReportedMessage>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ReportedMessage> {
        self.messages.lock().clone()
    }

    /// Most recent message, if any
    pub fn last(&self) -> Option<ReportedMessage> {
        self.messages.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl JobOutcomeReporter for MemoryReporter {
    fn report_success(&self, message: &str) {
        self.messages.lock().push(ReportedMessage {
            success: true,
            text: message.to_string(),
        });
    }

    fn report_error(&self, message: &str) {
        self.messages.lock().push(ReportedMessage {
            success: false,
            text: message.to_string(),
        });
    }
}
