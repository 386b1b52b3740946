use crate::job::{CommitSummary, DiffSummary, JobFailure, ResultBundle, TestReport};
use crate::{RequestId, WizardSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User edited the repository URL.
    RepoUrlChanged(String),
    /// User edited the branch name; blank means the default branch.
    BranchChanged(String),
    /// User edited the feature description.
    VibeChanged(String),
    /// User pasted the external planner's output.
    PlannerOutputChanged(String),
    /// User described issues found after the coding pass.
    FeedbackChanged(String),
    /// User pasted the planner's updated plan for the iteration.
    IterationPlannerOutputChanged(String),
    /// Move forward one step, gated by validation.
    NextClicked,
    /// Move back one step.
    BackClicked,
    /// Drop all progress and start over.
    ResetClicked,
    /// Submit the generation job for the current step.
    GenerateClicked,
    /// Go back to the feedback step for another round.
    StartIterationClicked,
    RefineClicked,
    RefineAccepted,
    RefineRejected,
    RunTestsClicked,
    ViewCommitsClicked,
    ViewDiffClicked,
    NoticeDismissed,
    /// Restore state persisted by a previous session.
    RestoreSnapshot(WizardSnapshot),
    /// Backend accepted a job submission.
    JobSubmitted {
        request: RequestId,
        job_id: String,
        session_id: Option<String>,
    },
    /// Progress report for a running job.
    JobProgress {
        request: RequestId,
        phase: Option<String>,
        message: String,
        percent: u8,
        current: Option<u32>,
        total: Option<u32>,
    },
    /// Terminal outcome of a job, including failed submissions.
    JobDone {
        request: RequestId,
        result: Result<ResultBundle, JobFailure>,
    },
    RefineDone {
        request: RequestId,
        result: Result<String, String>,
    },
    TestsDone {
        request: RequestId,
        result: Result<TestReport, String>,
    },
    CommitsLoaded {
        request: RequestId,
        result: Result<Vec<CommitSummary>, String>,
    },
    DiffLoaded {
        request: RequestId,
        result: Result<DiffSummary, String>,
    },
    /// Render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
