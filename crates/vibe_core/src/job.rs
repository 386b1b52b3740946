use std::fmt;

use crate::{RequestId, Stage};

/// Lifecycle of the most recent context-generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

/// The one context-generation job the wizard is waiting on. It only exists
/// while the job is processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub request: RequestId,
    pub stage: Stage,
    /// Backend job id, known once the submission has been accepted.
    pub job_id: Option<String>,
    pub phase: Option<String>,
    pub message: String,
    pub percent: u8,
    pub current: u32,
    pub total: u32,
}

impl ActiveJob {
    pub(crate) fn new(request: RequestId, stage: Stage) -> Self {
        Self {
            request,
            stage,
            job_id: None,
            phase: None,
            message: "Submitting request...".to_string(),
            percent: 0,
            current: 0,
            total: 0,
        }
    }

    /// Applies a progress report. The percentage only ever moves forward.
    pub(crate) fn apply_progress(
        &mut self,
        phase: Option<String>,
        message: String,
        percent: u8,
        current: Option<u32>,
        total: Option<u32>,
    ) {
        self.phase = phase;
        self.message = message;
        self.percent = self.percent.max(percent.min(100));
        if let Some(current) = current {
            self.current = current;
        }
        if let Some(total) = total {
            self.total = total;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection or stream broke; the job outcome is unknown.
    Transport,
    /// The backend reported an error string.
    Business,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
        }
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Business,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Transport => write!(f, "{}", self.message),
            FailureKind::Business => write!(f, "Error: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffSummary {
    pub additions: u32,
    pub deletions: u32,
    pub files: Vec<String>,
    pub content: String,
}

/// Final output of a context-generation job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultBundle {
    pub copy_text: String,
    pub manifest_html: String,
    pub files_processed: u64,
    pub tokens_used: u64,
    pub files_skipped: u64,
    pub skipped_files: Vec<SkippedFile>,
    pub diff: Option<DiffSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub outcome: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestReport {
    pub passed: u32,
    pub failed: u32,
    pub framework: Option<String>,
    pub docker: bool,
    pub details: Vec<TestCase>,
    pub output: Option<String>,
}

impl TestReport {
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub author: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
    pub diff: Option<String>,
}

impl CommitSummary {
    pub fn short_sha(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(7)
            .map_or(self.sha.len(), |(idx, _)| idx);
        &self.sha[..end]
    }
}
