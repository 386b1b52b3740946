//! Vibe Coder core: pure wizard state machine, job bookkeeping and widget models.
mod effect;
mod job;
mod msg;
mod snapshot;
mod state;
mod update;
mod validate;
mod view_model;
pub mod widgets;

pub use effect::{Effect, JobSubmission};
pub use job::{
    ActiveJob, CommitSummary, DiffSummary, FailureKind, JobFailure, JobStatus, ResultBundle,
    SkippedFile, TestCase, TestReport,
};
pub use msg::Msg;
pub use snapshot::{WizardSnapshot, PLANNER_TEXT_LIMIT, SNAPSHOT_TEXT_LIMIT};
pub use state::{AppState, RequestId, Stage, Step, WizardConfig, DEFAULT_BRANCH};
pub use update::update;
pub use validate::{validate_repo_url, ValidationError};
pub use view_model::{AppViewModel, PanelView, ProgressView};
