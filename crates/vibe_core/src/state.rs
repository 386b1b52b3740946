use std::collections::BTreeMap;

use crate::job::{
    ActiveJob, CommitSummary, DiffSummary, JobFailure, JobStatus, ResultBundle, TestReport,
};
use crate::snapshot::WizardSnapshot;
use crate::validate::ValidationError;
use crate::view_model::{AppViewModel, PanelView, ProgressView};

/// Client-side ticket for one outstanding network request.
pub type RequestId = u64;

pub const DEFAULT_BRANCH: &str = "main";

/// Which kind of context bundle the backend should generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Plan,
    Code,
    Iterate,
    IterationCode,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Plan, Stage::Code, Stage::Iterate, Stage::IterationCode];

    /// Single-letter code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Stage::Plan => "A",
            Stage::Code => "B",
            Stage::Iterate => "C",
            Stage::IterationCode => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.code().eq_ignore_ascii_case(code.trim()))
    }

    /// The step whose generate action submits this stage.
    pub fn generated_on(self) -> Step {
        match self {
            Stage::Plan => Step::PlanContext,
            Stage::Code => Step::PlannerOutput,
            Stage::Iterate => Step::Feedback,
            Stage::IterationCode => Step::IterationPlan,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Plan => "Plan",
            Stage::Code => "Code",
            Stage::Iterate => "Iterate",
            Stage::IterationCode => "Iteration Code",
        }
    }
}

/// Wizard steps in order. The discriminant is the 1-based step number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Step {
    #[default]
    Describe = 1,
    PlanContext = 2,
    PlannerOutput = 3,
    CoderContext = 4,
    Feedback = 5,
    IterationPlan = 6,
    IterationCode = 7,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Describe,
        Step::PlanContext,
        Step::PlannerOutput,
        Step::CoderContext,
        Step::Feedback,
        Step::IterationPlan,
        Step::IterationCode,
    ];

    pub const FIRST: Step = Step::Describe;
    pub const LAST: Step = Step::IterationCode;

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Step::ALL.into_iter().find(|step| step.number() == number)
    }

    pub fn next(self) -> Option<Self> {
        Step::from_number(self.number() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Step::from_number)
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Describe => "Describe your feature",
            Step::PlanContext => "Generate planning context",
            Step::PlannerOutput => "Paste planner output",
            Step::CoderContext => "Coding context",
            Step::Feedback => "Feedback",
            Step::IterationPlan => "Iteration planning",
            Step::IterationCode => "Iteration coding",
        }
    }

    /// The stage that is active while this step is shown.
    pub fn stage(self) -> Stage {
        match self {
            Step::Describe | Step::PlanContext => Stage::Plan,
            Step::PlannerOutput | Step::CoderContext => Stage::Code,
            Step::Feedback => Stage::Iterate,
            Step::IterationPlan | Step::IterationCode => Stage::IterationCode,
        }
    }

    /// Stage submitted by the generate action on this step, if any.
    pub fn generates(self) -> Option<Stage> {
        match self {
            Step::PlanContext => Some(Stage::Plan),
            Step::PlannerOutput => Some(Stage::Code),
            Step::Feedback => Some(Stage::Iterate),
            Step::IterationPlan => Some(Stage::IterationCode),
            Step::Describe | Step::CoderContext | Step::IterationCode => None,
        }
    }

    /// Stage whose generated output is displayed on this step.
    pub fn shows_output_of(self) -> Option<Stage> {
        match self {
            Step::PlannerOutput => Some(Stage::Plan),
            Step::CoderContext => Some(Stage::Code),
            Step::IterationPlan => Some(Stage::Iterate),
            Step::IterationCode => Some(Stage::IterationCode),
            Step::Describe | Step::PlanContext | Step::Feedback => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WizardConfig {
    /// Keep (bounded) planner output in the persisted snapshot.
    pub persist_planner_output: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    config: WizardConfig,
    step: Step,
    stage: Stage,
    repo_url: String,
    branch: String,
    vibe: String,
    refined_vibe: Option<String>,
    planner_output: String,
    feedback: String,
    iteration_planner_output: String,
    job_id: Option<String>,
    session_id: Option<String>,
    last_commit_sha: Option<String>,
    job: Option<ActiveJob>,
    /// Status of the latest job; kept after it ends until the next one starts.
    job_status: Option<JobStatus>,
    outputs: BTreeMap<Stage, ResultBundle>,
    tests: Option<TestReport>,
    commits: Vec<CommitSummary>,
    recent_diff: Option<DiffSummary>,
    validation: Option<ValidationError>,
    notice: Option<String>,
    refine_pending: Option<RequestId>,
    tests_pending: Option<RequestId>,
    commits_pending: Option<RequestId>,
    diff_pending: Option<RequestId>,
    next_request: RequestId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(WizardConfig::default())
    }

    pub fn with_config(config: WizardConfig) -> Self {
        Self {
            config,
            branch: DEFAULT_BRANCH.to_string(),
            next_request: 1,
            ..Self::default()
        }
    }

    pub fn config(&self) -> WizardConfig {
        self.config
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn vibe(&self) -> &str {
        &self.vibe
    }

    pub fn refined_vibe(&self) -> Option<&str> {
        self.refined_vibe.as_deref()
    }

    pub fn planner_output(&self) -> &str {
        &self.planner_output
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn iteration_planner_output(&self) -> &str {
        &self.iteration_planner_output
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_commit_sha(&self) -> Option<&str> {
        self.last_commit_sha.as_deref()
    }

    pub fn job(&self) -> Option<&ActiveJob> {
        self.job.as_ref()
    }

    pub fn job_status(&self) -> Option<JobStatus> {
        self.job_status
    }

    pub fn output(&self, stage: Stage) -> Option<&ResultBundle> {
        self.outputs.get(&stage)
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        self.validation.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> AppViewModel {
        let panels = Step::ALL
            .into_iter()
            .map(|step| PanelView {
                step,
                title: step.title(),
                visible: step == self.step,
            })
            .collect();

        let progress = self.job.as_ref().map(|job| ProgressView {
            stage: job.stage,
            message: job.message.clone(),
            percent: job.percent,
            current: job.current,
            total: job.total,
        });

        AppViewModel {
            step: self.step,
            stage: self.stage,
            panels,
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            vibe: self.vibe.clone(),
            vibe_chars: self.vibe.chars().count(),
            refined_vibe: self.refined_vibe.clone(),
            planner_output_chars: self.planner_output.chars().count(),
            feedback_chars: self.feedback.chars().count(),
            session_id: self.session_id.clone(),
            validation: self.validation.as_ref().map(ToString::to_string),
            notice: self.notice.clone(),
            progress,
            job_status: self.job_status,
            output: self
                .step
                .shows_output_of()
                .and_then(|stage| self.outputs.get(&stage).cloned()),
            tests: self.tests.clone(),
            tests_running: self.tests_pending.is_some(),
            commits: self.commits.clone(),
            recent_diff: self.recent_diff.clone(),
            refining: self.refine_pending.is_some(),
            can_go_back: self.step.prev().is_some(),
            can_advance: self.step.next().is_some(),
            can_generate: self.step.generates().is_some() && self.job.is_none(),
            dirty: self.dirty,
        }
    }

    /// Bounded projection written to durable storage.
    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot::project(self)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn allocate_request(&mut self) -> RequestId {
        let request = self.next_request.max(1);
        self.next_request = request + 1;
        request
    }

    /// Fresh state that keeps configuration and the request counter, so late
    /// replies addressed to pre-reset requests can never match a new one.
    pub(crate) fn reset(&mut self) -> Option<RequestId> {
        let cancelled = self.job.as_ref().map(|job| job.request);
        let next_request = self.next_request;
        *self = Self::with_config(self.config);
        self.next_request = next_request;
        self.mark_dirty();
        cancelled
    }

    pub(crate) fn restore(&mut self, snapshot: WizardSnapshot) {
        let next_request = self.next_request;
        *self = Self::with_config(self.config);
        self.next_request = next_request;

        self.step = Step::from_number(snapshot.current_step).unwrap_or(Step::FIRST);
        self.stage = self.step.stage();
        self.repo_url = snapshot.repo_url;
        self.branch = if snapshot.branch.trim().is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            snapshot.branch
        };
        self.vibe = snapshot.vibe.unwrap_or_default();
        self.refined_vibe = snapshot.refined_vibe.filter(|text| !text.is_empty());
        self.planner_output = snapshot.planner_output.unwrap_or_default();
        self.session_id = snapshot.session_id;
        self.last_commit_sha = snapshot.last_commit_sha;
        self.mark_dirty();
    }

    pub(crate) fn set_step(&mut self, step: Step) {
        self.step = step;
        self.stage = step.stage();
        self.validation = None;
        self.mark_dirty();
    }

    pub(crate) fn set_validation(&mut self, error: ValidationError) {
        self.validation = Some(error);
        self.mark_dirty();
    }

    pub(crate) fn clear_validation(&mut self) {
        if self.validation.take().is_some() {
            self.mark_dirty();
        }
    }

    pub(crate) fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.mark_dirty();
    }

    pub(crate) fn dismiss_notice(&mut self) {
        if self.notice.take().is_some() {
            self.mark_dirty();
        }
    }

    pub(crate) fn set_repo_url(&mut self, url: String) {
        let url = url.trim().to_string();
        if url == self.repo_url {
            return;
        }
        self.repo_url = url;
        self.refined_vibe = None;
        self.clear_validation();
        self.mark_dirty();
    }

    pub(crate) fn set_branch(&mut self, branch: String) {
        let branch = branch.trim();
        let branch = if branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            branch
        };
        if branch != self.branch {
            self.branch = branch.to_string();
            self.mark_dirty();
        }
    }

    pub(crate) fn set_vibe(&mut self, vibe: String) {
        if vibe == self.vibe {
            return;
        }
        self.vibe = vibe;
        let refined_still_matches = self.refined_vibe.as_deref().is_some_and(|refined| {
            let head: String = refined.chars().take(50).collect();
            self.vibe.contains(&head)
        });
        if !refined_still_matches {
            self.refined_vibe = None;
        }
        self.clear_validation();
        self.mark_dirty();
    }

    pub(crate) fn set_planner_output(&mut self, text: String) {
        if text != self.planner_output {
            self.planner_output = text;
            self.clear_validation();
            self.mark_dirty();
        }
    }

    pub(crate) fn set_feedback(&mut self, text: String) {
        if text != self.feedback {
            self.feedback = text;
            self.clear_validation();
            self.mark_dirty();
        }
    }

    pub(crate) fn set_iteration_planner_output(&mut self, text: String) {
        if text != self.iteration_planner_output {
            self.iteration_planner_output = text;
            self.clear_validation();
            self.mark_dirty();
        }
    }

    pub(crate) fn start_job(&mut self, request: RequestId, stage: Stage) {
        self.job = Some(ActiveJob::new(request, stage));
        self.job_status = Some(JobStatus::Processing);
        self.job_id = None;
        self.notice = None;
        self.validation = None;
        self.mark_dirty();
    }

    /// Returns the active job only when `request` still identifies it.
    pub(crate) fn job_for(&mut self, request: RequestId) -> Option<&mut ActiveJob> {
        self.job.as_mut().filter(|job| job.request == request)
    }

    pub(crate) fn record_submission(
        &mut self,
        request: RequestId,
        job_id: String,
        session_id: Option<String>,
    ) -> bool {
        let Some(job) = self.job_for(request) else {
            return false;
        };
        job.job_id = Some(job_id.clone());
        self.job_id = Some(job_id);
        if let Some(session_id) = session_id.filter(|id| !id.is_empty()) {
            self.session_id = Some(session_id);
        }
        self.mark_dirty();
        true
    }

    /// Ends the job if `request` still identifies it, recording `status`.
    pub(crate) fn finish_job(&mut self, request: RequestId, status: JobStatus) -> Option<ActiveJob> {
        if self.job.as_ref().is_some_and(|job| job.request == request) {
            self.job_status = Some(status);
            self.mark_dirty();
            self.job.take()
        } else {
            None
        }
    }

    pub(crate) fn store_output(&mut self, stage: Stage, bundle: ResultBundle) {
        if let Some(diff) = bundle.diff.clone() {
            self.recent_diff = Some(diff);
        }
        self.outputs.insert(stage, bundle);
        self.mark_dirty();
    }

    pub(crate) fn fail_job(&mut self, failure: &JobFailure) {
        self.set_notice(failure.to_string());
    }

    pub(crate) fn accept_refined(&mut self) -> bool {
        match self.refined_vibe.take() {
            Some(refined) => {
                self.vibe = refined;
                self.clear_validation();
                self.mark_dirty();
                true
            }
            None => false,
        }
    }

    pub(crate) fn reject_refined(&mut self) -> bool {
        let had = self.refined_vibe.take().is_some();
        if had {
            self.mark_dirty();
        }
        had
    }

    pub(crate) fn set_refined(&mut self, refined: String) {
        self.refined_vibe = Some(refined);
        self.mark_dirty();
    }

    pub(crate) fn refine_pending(&self) -> Option<RequestId> {
        self.refine_pending
    }

    pub(crate) fn set_refine_pending(&mut self, request: Option<RequestId>) {
        self.refine_pending = request;
        self.mark_dirty();
    }

    pub(crate) fn tests_pending(&self) -> Option<RequestId> {
        self.tests_pending
    }

    pub(crate) fn set_tests_pending(&mut self, request: Option<RequestId>) {
        self.tests_pending = request;
        self.mark_dirty();
    }

    pub(crate) fn set_tests(&mut self, report: TestReport) {
        self.tests = Some(report);
        self.mark_dirty();
    }

    pub(crate) fn commits_pending(&self) -> Option<RequestId> {
        self.commits_pending
    }

    pub(crate) fn set_commits_pending(&mut self, request: Option<RequestId>) {
        self.commits_pending = request;
        self.mark_dirty();
    }

    pub(crate) fn set_commits(&mut self, commits: Vec<CommitSummary>) {
        if let Some(latest) = commits.first() {
            self.last_commit_sha = Some(latest.sha.clone());
        }
        self.commits = commits;
        self.mark_dirty();
    }

    pub(crate) fn diff_pending(&self) -> Option<RequestId> {
        self.diff_pending
    }

    pub(crate) fn set_diff_pending(&mut self, request: Option<RequestId>) {
        self.diff_pending = request;
        self.mark_dirty();
    }

    pub(crate) fn set_recent_diff(&mut self, diff: DiffSummary) {
        self.recent_diff = Some(diff);
        self.mark_dirty();
    }
}
