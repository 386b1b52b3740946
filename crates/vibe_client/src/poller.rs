use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use vibe_logging::{vibe_debug, vibe_info, vibe_trace, vibe_warn};

use crate::{Backend, ClientError, JobResult, JobStatusEvent};

/// What the user is told when a job's event stream breaks.
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Please try again.";

/// Percentage and message for the phases the backend is known to report.
pub fn phase_progress(phase: &str) -> Option<(u8, &'static str)> {
    match phase.trim().to_ascii_lowercase().as_str() {
        "extracting" => Some((10, "Cloning repository and extracting files...")),
        "analyzing" => Some((40, "Analyzing code structure and patterns...")),
        "processing" => Some((70, "AI is processing your request...")),
        "finalizing" => Some((90, "Generating final output...")),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgressUpdate {
    pub phase: Option<String>,
    pub message: String,
    /// Never lower than any percentage reported before for the same job.
    pub percent: u8,
    pub current: Option<u32>,
    pub total: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamVerdict {
    Ignore,
    Progress(JobProgressUpdate),
    /// Terminal success. `None` means the result must be fetched separately.
    Completed(Option<JobResult>),
    Failed(String),
}

/// Interprets one job's status events. Terminal verdicts are produced once;
/// everything after them is ignored.
#[derive(Debug, Clone, Default)]
pub struct JobStream {
    percent: u8,
    finished: bool,
}

impl JobStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn accept(&mut self, event: JobStatusEvent) -> StreamVerdict {
        if self.finished {
            return StreamVerdict::Ignore;
        }

        if let Some(error) = event.error.filter(|error| !error.is_empty()) {
            self.finished = true;
            return StreamVerdict::Failed(error);
        }

        let status = event.status.as_deref().map(str::to_ascii_lowercase);
        let phase_completed = event
            .phase
            .as_deref()
            .is_some_and(|phase| phase.eq_ignore_ascii_case("completed"));
        if status.as_deref() == Some("completed") || phase_completed {
            self.finished = true;
            self.percent = 100;
            return StreamVerdict::Completed(event.result);
        }
        if matches!(status.as_deref(), Some("error" | "failed")) {
            self.finished = true;
            return StreamVerdict::Failed("Job failed".to_string());
        }

        if event.keepalive {
            return StreamVerdict::Ignore;
        }

        let message = match event.phase.as_deref() {
            Some(phase) => match phase_progress(phase) {
                Some((percent, message)) => {
                    self.percent = self.percent.max(percent);
                    message.to_string()
                }
                None => format!("{}...", capitalize(phase)),
            },
            None => "Processing...".to_string(),
        };

        StreamVerdict::Progress(JobProgressUpdate {
            phase: event.phase,
            message,
            percent: self.percent,
            current: event.current,
            total: event.total,
        })
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Follows one job's event stream to its terminal state.
pub struct JobPoller {
    backend: Arc<dyn Backend>,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Resolves once with the job outcome. Progress is reported through
    /// `on_progress`. The stream is closed when this returns, including on
    /// cancellation (`ClientError::Cancelled`).
    pub async fn run(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(JobProgressUpdate) + Send),
    ) -> Result<JobResult, ClientError> {
        let mut events = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            events = self.backend.job_events(job_id) => events?,
        };
        let mut stream = JobStream::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    vibe_debug!("Closing event stream of cancelled job {}", job_id);
                    return Err(ClientError::Cancelled);
                }
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(ClientError::Decode(err))) => {
                    vibe_warn!("Skipping undecodable event for job {}: {}", job_id, err);
                    continue;
                }
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(ClientError::Stream(
                        "stream ended before the job finished".to_string(),
                    ))
                }
            };

            vibe_trace!("Job {} event: {:?}", job_id, event);
            match stream.accept(event) {
                StreamVerdict::Ignore => {}
                StreamVerdict::Progress(update) => on_progress(update),
                StreamVerdict::Completed(Some(result)) => {
                    vibe_info!("Job {} completed", job_id);
                    return Ok(result);
                }
                StreamVerdict::Completed(None) => {
                    drop(events);
                    vibe_info!("Job {} completed; fetching result", job_id);
                    return tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ClientError::Cancelled),
                        result = self.backend.fetch_result(job_id) => result,
                    };
                }
                StreamVerdict::Failed(error) => {
                    vibe_warn!("Job {} failed: {}", job_id, error);
                    return Err(ClientError::Business(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str) -> JobStatusEvent {
        JobStatusEvent {
            phase: Some(name.to_string()),
            ..JobStatusEvent::default()
        }
    }

    fn percents(stream: &mut JobStream, phases: &[&str]) -> Vec<u8> {
        phases
            .iter()
            .filter_map(|name| match stream.accept(phase(name)) {
                StreamVerdict::Progress(update) => Some(update.percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn percentages_never_decrease() {
        let mut stream = JobStream::new();
        assert_eq!(
            percents(&mut stream, &["extracting", "processing", "analyzing"]),
            vec![10, 70, 70]
        );
    }

    #[test]
    fn unknown_phase_keeps_percentage() {
        let mut stream = JobStream::new();
        percents(&mut stream, &["Analyzing"]);
        match stream.accept(phase("indexing")) {
            StreamVerdict::Progress(update) => {
                assert_eq!(update.percent, 40);
                assert_eq!(update.message, "Indexing...");
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn terminal_verdict_is_produced_once() {
        let mut stream = JobStream::new();
        let done = JobStatusEvent {
            status: Some("completed".to_string()),
            ..JobStatusEvent::default()
        };
        assert_eq!(stream.accept(done.clone()), StreamVerdict::Completed(None));
        assert_eq!(stream.accept(done), StreamVerdict::Ignore);
        assert_eq!(
            stream.accept(JobStatusEvent {
                error: Some("late".to_string()),
                ..JobStatusEvent::default()
            }),
            StreamVerdict::Ignore
        );
    }

    #[test]
    fn keepalive_is_ignored() {
        let mut stream = JobStream::new();
        let keepalive = JobStatusEvent {
            keepalive: true,
            ..JobStatusEvent::default()
        };
        assert_eq!(stream.accept(keepalive), StreamVerdict::Ignore);
    }

    #[test]
    fn phase_completed_is_terminal() {
        let mut stream = JobStream::new();
        assert_eq!(
            stream.accept(phase("completed")),
            StreamVerdict::Completed(None)
        );
        assert!(stream.is_finished());
    }
}
