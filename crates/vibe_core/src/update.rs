use vibe_logging::{vibe_debug, vibe_info, vibe_warn};

use crate::validate::{validate_advance, validate_generate, validate_repo_url};
use crate::{AppState, Effect, JobStatus, JobSubmission, Msg, Stage, Step, ValidationError};

/// Pure update function: applies a message to state and returns any effects.
///
/// Whenever the persisted projection changes, a `PersistSnapshot` effect is
/// appended so durable storage mirrors the latest state (last write wins).
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let before = state.snapshot();
    let mut persist = true;

    let mut effects = match msg {
        Msg::RepoUrlChanged(url) => {
            state.set_repo_url(url);
            Vec::new()
        }
        Msg::BranchChanged(branch) => {
            state.set_branch(branch);
            Vec::new()
        }
        Msg::VibeChanged(vibe) => {
            state.set_vibe(vibe);
            Vec::new()
        }
        Msg::PlannerOutputChanged(text) => {
            state.set_planner_output(text);
            Vec::new()
        }
        Msg::FeedbackChanged(text) => {
            state.set_feedback(text);
            Vec::new()
        }
        Msg::IterationPlannerOutputChanged(text) => {
            state.set_iteration_planner_output(text);
            Vec::new()
        }
        Msg::NextClicked => {
            match validate_advance(&state) {
                Ok(()) => {
                    if let Some(next) = state.step().next() {
                        state.set_step(next);
                    }
                }
                Err(err) => {
                    vibe_debug!("Advance from step {} rejected: {}", state.step().number(), err);
                    state.set_validation(err);
                }
            }
            Vec::new()
        }
        Msg::BackClicked => {
            if let Some(prev) = state.step().prev() {
                state.set_step(prev);
            }
            Vec::new()
        }
        Msg::ResetClicked => {
            persist = false;
            let mut effects = Vec::with_capacity(2);
            if let Some(request) = state.reset() {
                vibe_info!("Reset while request {} in flight; closing its stream", request);
                effects.push(Effect::CancelJob { request });
            }
            effects.push(Effect::ClearSnapshot);
            effects
        }
        Msg::GenerateClicked => generate(&mut state),
        Msg::StartIterationClicked => match state.step() {
            Step::CoderContext | Step::IterationCode => {
                state.set_step(Step::Feedback);
                if state.last_commit_sha().is_some() && state.diff_pending().is_none() {
                    request_diff(&mut state)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        },
        Msg::RefineClicked => {
            if state.vibe().trim().is_empty() {
                state.set_validation(ValidationError::NothingToRefine);
                Vec::new()
            } else if state.refine_pending().is_some() {
                Vec::new()
            } else {
                let request = state.allocate_request();
                state.set_refine_pending(Some(request));
                vec![Effect::RefinePrompt {
                    request,
                    prompt: state.vibe().to_string(),
                    repo_url: state.repo_url().to_string(),
                }]
            }
        }
        Msg::RefineAccepted => {
            state.accept_refined();
            Vec::new()
        }
        Msg::RefineRejected => {
            state.reject_refined();
            Vec::new()
        }
        Msg::RunTestsClicked => {
            if let Err(err) = validate_repo_url(state.repo_url()) {
                state.set_validation(err);
                Vec::new()
            } else if state.tests_pending().is_some() {
                Vec::new()
            } else {
                let request = state.allocate_request();
                state.set_tests_pending(Some(request));
                vec![Effect::RunTests {
                    request,
                    repo_url: state.repo_url().to_string(),
                    session_id: state.session_id().map(ToOwned::to_owned),
                }]
            }
        }
        Msg::ViewCommitsClicked => {
            if let Err(err) = validate_repo_url(state.repo_url()) {
                state.set_validation(err);
                Vec::new()
            } else if state.commits_pending().is_some() {
                Vec::new()
            } else {
                let request = state.allocate_request();
                state.set_commits_pending(Some(request));
                vec![Effect::FetchCommits {
                    request,
                    repo_url: state.repo_url().to_string(),
                    branch: state.branch().to_string(),
                    session_id: state.session_id().map(ToOwned::to_owned),
                }]
            }
        }
        Msg::ViewDiffClicked => {
            if state.last_commit_sha().is_none() {
                state.set_validation(ValidationError::NoCommitSelected);
                Vec::new()
            } else if state.diff_pending().is_some() {
                Vec::new()
            } else {
                request_diff(&mut state)
            }
        }
        Msg::NoticeDismissed => {
            state.dismiss_notice();
            Vec::new()
        }
        Msg::RestoreSnapshot(snapshot) => {
            persist = false;
            state.restore(snapshot);
            Vec::new()
        }
        Msg::JobSubmitted {
            request,
            job_id,
            session_id,
        } => {
            if !state.record_submission(request, job_id, session_id) {
                vibe_debug!("Ignoring submission ack for stale request {}", request);
            }
            Vec::new()
        }
        Msg::JobProgress {
            request,
            phase,
            message,
            percent,
            current,
            total,
        } => {
            match state.job_for(request) {
                Some(job) => {
                    job.apply_progress(phase, message, percent, current, total);
                    state.mark_dirty();
                }
                None => vibe_debug!("Ignoring progress for stale request {}", request),
            }
            Vec::new()
        }
        Msg::JobDone { request, result } => {
            let status = if result.is_ok() {
                JobStatus::Completed
            } else {
                JobStatus::Error
            };
            match state.finish_job(request, status) {
                Some(job) => match result {
                    Ok(bundle) => {
                        vibe_info!(
                            "Stage {} finished: {} files, {} tokens",
                            job.stage.code(),
                            bundle.files_processed,
                            bundle.tokens_used
                        );
                        state.store_output(job.stage, bundle);
                        if state.step() == job.stage.generated_on() {
                            if let Some(next) = state.step().next() {
                                state.set_step(next);
                            }
                        }
                    }
                    Err(failure) => {
                        vibe_warn!("Stage {} failed: {}", job.stage.code(), failure.message);
                        state.fail_job(&failure);
                    }
                },
                None => vibe_debug!("Ignoring outcome for stale request {}", request),
            }
            Vec::new()
        }
        Msg::RefineDone { request, result } => {
            if state.refine_pending() == Some(request) {
                state.set_refine_pending(None);
                match result {
                    Ok(refined) => state.set_refined(refined),
                    Err(message) => state.set_notice(format!("Error refining prompt: {message}")),
                }
            }
            Vec::new()
        }
        Msg::TestsDone { request, result } => {
            if state.tests_pending() == Some(request) {
                state.set_tests_pending(None);
                match result {
                    Ok(report) => state.set_tests(report),
                    Err(message) => state.set_notice(format!("Test Error: {message}")),
                }
            }
            Vec::new()
        }
        Msg::CommitsLoaded { request, result } => {
            if state.commits_pending() == Some(request) {
                state.set_commits_pending(None);
                match result {
                    Ok(commits) => state.set_commits(commits),
                    Err(message) => state.set_notice(format!("Error: {message}")),
                }
            }
            Vec::new()
        }
        Msg::DiffLoaded { request, result } => {
            if state.diff_pending() == Some(request) {
                state.set_diff_pending(None);
                match result {
                    Ok(diff) => state.set_recent_diff(diff),
                    Err(message) => state.set_notice(format!("Error fetching diff: {message}")),
                }
            }
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    if persist {
        let after = state.snapshot();
        if after != before {
            effects.push(Effect::PersistSnapshot(after));
        }
    }

    (state, effects)
}

fn generate(state: &mut AppState) -> Vec<Effect> {
    if let Some(job) = state.job() {
        vibe_debug!("Generate ignored; request {} still running", job.request);
        return Vec::new();
    }
    let Some(stage) = state.step().generates() else {
        return Vec::new();
    };
    if let Err(err) = validate_generate(state, stage) {
        vibe_debug!("Generate for stage {} rejected: {}", stage.code(), err);
        state.set_validation(err);
        return Vec::new();
    }

    let request = state.allocate_request();
    state.start_job(request, stage);
    vibe_info!("Submitting stage {} as request {}", stage.code(), request);
    vec![Effect::SubmitJob {
        request,
        submission: build_submission(state, stage),
    }]
}

fn build_submission(state: &AppState, stage: Stage) -> JobSubmission {
    let planner_output = non_empty(state.planner_output());
    let feedback = non_empty(state.feedback());
    let mut submission = JobSubmission {
        stage,
        repo_url: state.repo_url().to_string(),
        branch: state.branch().to_string(),
        vibe: state.vibe().to_string(),
        planner_output: None,
        feedback_log: None,
        previous_planner_output: None,
        original_planner_output: None,
        session_id: state.session_id().map(ToOwned::to_owned),
    };
    match stage {
        Stage::Plan => {}
        Stage::Code => submission.planner_output = planner_output,
        Stage::Iterate => {
            submission.feedback_log = feedback;
            submission.previous_planner_output = planner_output;
        }
        Stage::IterationCode => {
            submission.planner_output = non_empty(state.iteration_planner_output());
            submission.feedback_log = feedback;
            submission.original_planner_output = planner_output;
        }
    }
    submission
}

fn request_diff(state: &mut AppState) -> Vec<Effect> {
    let Some(sha) = state.last_commit_sha().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    let request = state.allocate_request();
    state.set_diff_pending(Some(request));
    vec![Effect::FetchDiff {
        request,
        repo_url: state.repo_url().to_string(),
        sha,
        session_id: state.session_id().map(ToOwned::to_owned),
    }]
}

fn non_empty(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_string())
}
