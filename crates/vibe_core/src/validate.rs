use thiserror::Error;
use url::Url;

use crate::{AppState, Stage, Step};

const GITHUB_PREFIX: &str = "https://github.com/";

/// Local input problems. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please describe your feature/goal")]
    MissingVibe,
    #[error("Please enter a GitHub repository URL")]
    MissingRepoUrl,
    #[error("Please enter a valid GitHub repository URL (e.g., https://github.com/username/repo)")]
    InvalidRepoUrl,
    #[error("Please provide planner output")]
    MissingPlannerOutput,
    #[error("Please provide feedback or issues")]
    MissingFeedback,
    #[error("Please paste the updated planning output first")]
    MissingIterationPlannerOutput,
    #[error(
        "Your feature description appears to reference a different repository. \
         Please update it to match your selected repository."
    )]
    VibeReferencesOtherRepo,
    #[error("Please enter a feature description first")]
    NothingToRefine,
    #[error("No commit selected; load the commit history first")]
    NoCommitSelected,
}

/// Accepts exactly `https://github.com/<owner>/<repo>` where both parts are
/// made of ASCII letters, digits, `_` and `-`.
pub fn validate_repo_url(raw: &str) -> Result<(), ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingRepoUrl);
    }
    if !raw.starts_with(GITHUB_PREFIX) {
        return Err(ValidationError::InvalidRepoUrl);
    }
    let url = Url::parse(raw).map_err(|_| ValidationError::InvalidRepoUrl)?;
    if url.query().is_some() || url.fragment().is_some() || !url.username().is_empty() {
        return Err(ValidationError::InvalidRepoUrl);
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [owner, repo] if is_slug(owner) && is_slug(repo) => Ok(()),
        _ => Err(ValidationError::InvalidRepoUrl),
    }
}

fn is_slug(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub(crate) fn validate_describe(state: &AppState) -> Result<(), ValidationError> {
    if state.vibe().trim().is_empty() {
        return Err(ValidationError::MissingVibe);
    }
    validate_repo_url(state.repo_url())
}

/// Requirements for leaving the current step forwards.
pub(crate) fn validate_advance(state: &AppState) -> Result<(), ValidationError> {
    match state.step() {
        Step::Describe => validate_describe(state),
        Step::PlannerOutput => require(state.planner_output(), ValidationError::MissingPlannerOutput),
        Step::Feedback => require(state.feedback(), ValidationError::MissingFeedback),
        Step::IterationPlan => require(
            state.iteration_planner_output(),
            ValidationError::MissingIterationPlannerOutput,
        ),
        Step::PlanContext | Step::CoderContext | Step::IterationCode => Ok(()),
    }
}

/// Requirements for submitting a generation job for `stage`.
pub(crate) fn validate_generate(state: &AppState, stage: Stage) -> Result<(), ValidationError> {
    validate_describe(state)?;
    if references_other_repo(state.vibe(), state.repo_url()) {
        return Err(ValidationError::VibeReferencesOtherRepo);
    }
    match stage {
        Stage::Plan => Ok(()),
        Stage::Code => require(state.planner_output(), ValidationError::MissingPlannerOutput),
        Stage::Iterate => require(state.feedback(), ValidationError::MissingFeedback),
        Stage::IterationCode => require(
            state.iteration_planner_output(),
            ValidationError::MissingIterationPlannerOutput,
        ),
    }
}

fn require(text: &str, error: ValidationError) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        Err(error)
    } else {
        Ok(())
    }
}

fn references_other_repo(vibe: &str, repo_url: &str) -> bool {
    vibe.contains("github.com") && !vibe.contains(repo_url)
}
