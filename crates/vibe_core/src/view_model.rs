use crate::job::{CommitSummary, DiffSummary, JobStatus, ResultBundle, TestReport};
use crate::{Stage, Step};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub step: Step,
    pub title: &'static str,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub stage: Stage,
    pub message: String,
    pub percent: u8,
    pub current: u32,
    pub total: u32,
}

/// Everything the front-end needs to draw the wizard. Derived from
/// `AppState` only; the front-end never writes back into it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub step: Step,
    pub stage: Stage,
    pub panels: Vec<PanelView>,
    pub repo_url: String,
    pub branch: String,
    pub vibe: String,
    pub vibe_chars: usize,
    pub refined_vibe: Option<String>,
    pub planner_output_chars: usize,
    pub feedback_chars: usize,
    pub session_id: Option<String>,
    pub validation: Option<String>,
    pub notice: Option<String>,
    pub progress: Option<ProgressView>,
    pub job_status: Option<JobStatus>,
    pub output: Option<ResultBundle>,
    pub tests: Option<TestReport>,
    pub tests_running: bool,
    pub commits: Vec<CommitSummary>,
    pub recent_diff: Option<DiffSummary>,
    pub refining: bool,
    pub can_go_back: bool,
    pub can_advance: bool,
    pub can_generate: bool,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn visible_panels(&self) -> impl Iterator<Item = &PanelView> {
        self.panels.iter().filter(|panel| panel.visible)
    }
}
