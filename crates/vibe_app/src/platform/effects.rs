//! Executes core effects against the backend client and storage, and turns
//! client events back into messages for the core.

use vibe_client::{
    ClientError, ClientEvent, ClientHandle, CommitRecord, CommitsRequest, DiffPayload, DiffRequest,
    FailureKind as ClientFailureKind, GenerateRequest, JobProgressUpdate, JobResult,
    KeyValueStore, RequestId, TestResults, TestRunRequest, CONNECTION_LOST_MESSAGE,
};
use vibe_core::{
    CommitSummary, DiffSummary, Effect, JobFailure, JobSubmission, Msg, ResultBundle, SkippedFile,
    TestCase, TestReport,
};
use vibe_logging::{vibe_debug, vibe_warn};

use crate::platform::persistence::SnapshotPersistence;

pub struct EffectRunner<S: KeyValueStore> {
    client: ClientHandle,
    persistence: SnapshotPersistence<S>,
}

impl<S: KeyValueStore> EffectRunner<S> {
    pub fn new(client: ClientHandle, persistence: SnapshotPersistence<S>) -> Self {
        Self {
            client,
            persistence,
        }
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    pub fn persistence_mut(&mut self) -> &mut SnapshotPersistence<S> {
        &mut self.persistence
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_one(effect);
        }
    }

    fn run_one(&mut self, effect: Effect) {
        match effect {
            Effect::SubmitJob {
                request,
                submission,
            } => self.client.submit_job(request, generate_request(submission)),
            Effect::CancelJob { request } => self.client.cancel_job(request),
            Effect::PersistSnapshot(snapshot) => {
                self.persistence.save(&snapshot);
            }
            Effect::ClearSnapshot => self.persistence.clear(),
            Effect::RefinePrompt {
                request,
                prompt,
                repo_url,
            } => self.client.refine_prompt(request, prompt, repo_url),
            Effect::RunTests {
                request,
                repo_url,
                session_id,
            } => self
                .client
                .run_tests(request, TestRunRequest::auto(repo_url, session_id)),
            Effect::FetchCommits {
                request,
                repo_url,
                branch,
                session_id,
            } => self.client.fetch_commits(
                request,
                CommitsRequest {
                    repo_path: repo_url,
                    branch,
                    session_id,
                },
            ),
            Effect::FetchDiff {
                request,
                repo_url,
                sha,
                session_id,
            } => self.client.fetch_diff(
                request,
                DiffRequest {
                    repo_path: repo_url,
                    sha,
                    session_id,
                },
            ),
        }
    }
}

/// Where a client event should go.
#[derive(Debug)]
pub enum Routed {
    Wizard(Msg),
    Panel(ClientEvent),
}

pub fn route_event(event: ClientEvent) -> Routed {
    let msg = match event {
        ClientEvent::JobSubmitted {
            request,
            job_id,
            session_id,
        } => Msg::JobSubmitted {
            request,
            job_id,
            session_id,
        },
        ClientEvent::JobRejected { request, error } => {
            vibe_warn!("Submission {} rejected: {}", request, error);
            Msg::JobDone {
                request,
                result: Err(rejection_failure(error)),
            }
        }
        ClientEvent::JobProgress { request, update } => progress_msg(request, update),
        ClientEvent::JobFinished { request, result } => Msg::JobDone {
            request,
            result: result.map(result_bundle).map_err(job_failure),
        },
        ClientEvent::Refined { request, result } => Msg::RefineDone {
            request,
            result: result.map_err(|err| err.to_string()),
        },
        ClientEvent::TestsFinished { request, result } => Msg::TestsDone {
            request,
            result: result.map(test_report).map_err(|err| err.to_string()),
        },
        ClientEvent::CommitsLoaded { request, result } => Msg::CommitsLoaded {
            request,
            result: result
                .map(|commits| commits.into_iter().map(commit_summary).collect())
                .map_err(|err| err.to_string()),
        },
        ClientEvent::DiffLoaded { request, result } => Msg::DiffLoaded {
            request,
            result: result.map(diff_summary).map_err(|err| err.to_string()),
        },
        other => return Routed::Panel(other),
    };
    Routed::Wizard(msg)
}

fn progress_msg(request: RequestId, update: JobProgressUpdate) -> Msg {
    Msg::JobProgress {
        request,
        phase: update.phase,
        message: update.message,
        percent: update.percent,
        current: update.current,
        total: update.total,
    }
}

/// Backend-reported errors are shown verbatim; anything that broke the
/// stream collapses into the connection-lost notice.
fn job_failure(error: ClientError) -> JobFailure {
    match error.kind() {
        ClientFailureKind::Business => JobFailure::business(error.to_string()),
        kind => {
            vibe_debug!("Job stream failed ({}): {}", kind, error);
            JobFailure::transport(CONNECTION_LOST_MESSAGE)
        }
    }
}

/// A submission that never reached the backend keeps its transport label;
/// everything the backend answered with is its own message.
fn rejection_failure(error: ClientError) -> JobFailure {
    if error.kind().is_transport() {
        JobFailure::transport(error.to_string())
    } else {
        JobFailure::business(error.to_string())
    }
}

fn generate_request(submission: JobSubmission) -> GenerateRequest {
    GenerateRequest {
        repo_url: submission.repo_url,
        repo_branch: submission.branch,
        vibe: submission.vibe,
        stage: submission.stage.code().to_string(),
        planner_output: submission.planner_output,
        feedback_log: submission.feedback_log,
        previous_planner_output: submission.previous_planner_output,
        original_planner_output: submission.original_planner_output,
        session_id: submission.session_id,
    }
}

fn result_bundle(result: JobResult) -> ResultBundle {
    ResultBundle {
        copy_text: result.copy_text,
        manifest_html: result.manifest_html,
        files_processed: result.stats.files_processed,
        tokens_used: result.stats.used,
        files_skipped: result.stats.skipped,
        skipped_files: result
            .skipped_files
            .into_iter()
            .map(|file| SkippedFile {
                path: file.path,
                reason: file.reason,
            })
            .collect(),
        diff: result.diff.map(diff_summary),
    }
}

fn diff_summary(diff: DiffPayload) -> DiffSummary {
    DiffSummary {
        additions: diff.additions,
        deletions: diff.deletions,
        files: diff.files,
        content: diff.content,
    }
}

fn test_report(results: TestResults) -> TestReport {
    TestReport {
        passed: results.passed,
        failed: results.failed,
        framework: results.framework,
        docker: results.docker,
        details: results
            .details
            .into_iter()
            .map(|detail| TestCase {
                name: detail.name,
                outcome: detail.outcome,
                duration_secs: detail.duration.unwrap_or_default(),
            })
            .collect(),
        output: results.output,
    }
}

fn commit_summary(commit: CommitRecord) -> CommitSummary {
    CommitSummary {
        sha: commit.sha,
        author: commit.author,
        timestamp: commit.timestamp,
        message: commit.message,
        diff: commit.diff,
    }
}
