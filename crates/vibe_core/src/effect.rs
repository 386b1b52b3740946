use crate::{RequestId, Stage, WizardSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitJob {
        request: RequestId,
        submission: JobSubmission,
    },
    /// Close the event stream of a job nobody is waiting on anymore.
    CancelJob { request: RequestId },
    PersistSnapshot(WizardSnapshot),
    ClearSnapshot,
    RefinePrompt {
        request: RequestId,
        prompt: String,
        repo_url: String,
    },
    RunTests {
        request: RequestId,
        repo_url: String,
        session_id: Option<String>,
    },
    FetchCommits {
        request: RequestId,
        repo_url: String,
        branch: String,
        session_id: Option<String>,
    },
    FetchDiff {
        request: RequestId,
        repo_url: String,
        sha: String,
        session_id: Option<String>,
    },
}

/// Everything the backend needs to generate one context bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub stage: Stage,
    pub repo_url: String,
    pub branch: String,
    pub vibe: String,
    pub planner_output: Option<String>,
    pub feedback_log: Option<String>,
    pub previous_planner_output: Option<String>,
    pub original_planner_output: Option<String>,
    pub session_id: Option<String>,
}
