use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use vibe_logging::{vibe_debug, vibe_info, vibe_warn};

use crate::logs::{LogEvent, LogStreamer};
use crate::poller::JobPoller;
use crate::schedule::ScheduledTask;
use crate::{
    Backend, ClientError, ClientSettings, CommitRecord, CommitsRequest, DiffPayload, DiffRequest,
    GenerateRequest, IterationHistory, JobProgressUpdate, JobResult, LogRecord, ReqwestBackend,
    RequestId, RulePayload, RuleTemplate, TestResults, TestRunRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStreamStatus {
    Connected,
    Reconnecting,
}

/// Everything the client reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JobSubmitted {
        request: RequestId,
        job_id: String,
        session_id: Option<String>,
    },
    /// The submission itself failed; no job exists.
    JobRejected {
        request: RequestId,
        error: ClientError,
    },
    JobProgress {
        request: RequestId,
        update: JobProgressUpdate,
    },
    JobFinished {
        request: RequestId,
        result: Result<JobResult, ClientError>,
    },
    Refined {
        request: RequestId,
        result: Result<String, ClientError>,
    },
    TestsFinished {
        request: RequestId,
        result: Result<TestResults, ClientError>,
    },
    CommitsLoaded {
        request: RequestId,
        result: Result<Vec<CommitRecord>, ClientError>,
    },
    DiffLoaded {
        request: RequestId,
        result: Result<DiffPayload, ClientError>,
    },
    DockerChecked(Result<bool, ClientError>),
    LogStream(LogStreamStatus),
    LogLine(LogRecord),
    IterationsLoaded(Result<IterationHistory, ClientError>),
    IterationDiffLoaded {
        iteration_id: String,
        result: Result<Option<String>, ClientError>,
    },
    RulesLoaded(Result<Vec<RulePayload>, ClientError>),
    TemplatesLoaded(Result<Vec<RuleTemplate>, ClientError>),
    TemplateImported(Result<String, ClientError>),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<ClientEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

enum ClientCommand {
    SubmitJob {
        request: RequestId,
        body: GenerateRequest,
    },
    CancelJob {
        request: RequestId,
    },
    Refine {
        request: RequestId,
        prompt: String,
        repo_url: String,
    },
    RunTests {
        request: RequestId,
        body: TestRunRequest,
    },
    FetchCommits {
        request: RequestId,
        body: CommitsRequest,
    },
    FetchDiff {
        request: RequestId,
        body: DiffRequest,
    },
    CheckDocker,
    StartLogStream,
    StopLogStream,
    StartIterationPolling,
    StopIterationPolling,
    FetchIterationDiff {
        iteration_id: String,
    },
    ListRules,
    ListRuleTemplates,
    ImportRuleTemplate {
        filename: String,
    },
}

/// Owns the network side: a tokio runtime on its own thread, fed through a
/// command channel, reporting back through a `ClientEvent` channel.
///
/// Dropping the handle cancels every open job stream and scheduled task.
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<ClientCommand>,
    event_rx: mpsc::Receiver<ClientEvent>,
    shutdown: CancellationToken,
}

impl ClientHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let backend = ReqwestBackend::new(settings.clone())?;
        Ok(Self::with_backend(Arc::new(backend), settings))
    }

    pub fn with_backend(backend: Arc<dyn Backend>, settings: ClientSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let shutdown = CancellationToken::new();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
        let root = shutdown.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let mut worker = Worker {
                runtime: runtime.handle().clone(),
                backend,
                settings,
                sink,
                root,
                jobs: HashMap::new(),
                log_stream: None,
                iteration_polling: None,
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(command);
            }
            worker.root.cancel();
            vibe_debug!("Client command channel closed; stopping runtime");
        });

        Self {
            cmd_tx,
            event_rx,
            shutdown,
        }
    }

    fn send(&self, command: ClientCommand) {
        if self.cmd_tx.send(command).is_err() {
            vibe_warn!("Client runtime is gone; command dropped");
        }
    }

    pub fn submit_job(&self, request: RequestId, body: GenerateRequest) {
        self.send(ClientCommand::SubmitJob { request, body });
    }

    /// Closes the job's stream; no further events are reported for it.
    pub fn cancel_job(&self, request: RequestId) {
        self.send(ClientCommand::CancelJob { request });
    }

    pub fn refine_prompt(&self, request: RequestId, prompt: String, repo_url: String) {
        self.send(ClientCommand::Refine {
            request,
            prompt,
            repo_url,
        });
    }

    pub fn run_tests(&self, request: RequestId, body: TestRunRequest) {
        self.send(ClientCommand::RunTests { request, body });
    }

    pub fn fetch_commits(&self, request: RequestId, body: CommitsRequest) {
        self.send(ClientCommand::FetchCommits { request, body });
    }

    pub fn fetch_diff(&self, request: RequestId, body: DiffRequest) {
        self.send(ClientCommand::FetchDiff { request, body });
    }

    pub fn check_docker(&self) {
        self.send(ClientCommand::CheckDocker);
    }

    pub fn start_log_stream(&self) {
        self.send(ClientCommand::StartLogStream);
    }

    pub fn stop_log_stream(&self) {
        self.send(ClientCommand::StopLogStream);
    }

    pub fn start_iteration_polling(&self) {
        self.send(ClientCommand::StartIterationPolling);
    }

    pub fn stop_iteration_polling(&self) {
        self.send(ClientCommand::StopIterationPolling);
    }

    pub fn fetch_iteration_diff(&self, iteration_id: String) {
        self.send(ClientCommand::FetchIterationDiff { iteration_id });
    }

    pub fn list_rules(&self) {
        self.send(ClientCommand::ListRules);
    }

    pub fn list_rule_templates(&self) {
        self.send(ClientCommand::ListRuleTemplates);
    }

    pub fn import_rule_template(&self, filename: String) {
        self.send(ClientCommand::ImportRuleTemplate { filename });
    }

    pub fn try_recv(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Worker {
    runtime: Handle,
    backend: Arc<dyn Backend>,
    settings: ClientSettings,
    sink: Arc<dyn EventSink>,
    root: CancellationToken,
    jobs: HashMap<RequestId, CancellationToken>,
    log_stream: Option<ScheduledTask>,
    iteration_polling: Option<ScheduledTask>,
}

impl Worker {
    fn handle(&mut self, command: ClientCommand) {
        // Finished jobs cancel their own token on the way out.
        self.jobs.retain(|_, token| !token.is_cancelled());

        match command {
            ClientCommand::SubmitJob { request, body } => self.submit_job(request, body),
            ClientCommand::CancelJob { request } => {
                if let Some(token) = self.jobs.remove(&request) {
                    vibe_info!("Cancelling job stream for request {}", request);
                    token.cancel();
                }
            }
            ClientCommand::Refine {
                request,
                prompt,
                repo_url,
            } => self.spawn_call(move |backend, sink| async move {
                let result = backend.refine_prompt(&prompt, &repo_url).await;
                sink.emit(ClientEvent::Refined { request, result });
            }),
            ClientCommand::RunTests { request, body } => {
                self.spawn_call(move |backend, sink| async move {
                    let result = backend.run_tests(&body).await;
                    sink.emit(ClientEvent::TestsFinished { request, result });
                })
            }
            ClientCommand::FetchCommits { request, body } => {
                self.spawn_call(move |backend, sink| async move {
                    let result = backend.commits(&body).await;
                    sink.emit(ClientEvent::CommitsLoaded { request, result });
                })
            }
            ClientCommand::FetchDiff { request, body } => {
                self.spawn_call(move |backend, sink| async move {
                    let result = backend.diff(&body).await;
                    sink.emit(ClientEvent::DiffLoaded { request, result });
                })
            }
            ClientCommand::CheckDocker => self.spawn_call(|backend, sink| async move {
                sink.emit(ClientEvent::DockerChecked(backend.check_docker().await));
            }),
            ClientCommand::StartLogStream => self.start_log_stream(),
            ClientCommand::StopLogStream => {
                if self.log_stream.take().is_some() {
                    vibe_info!("Log stream stopped");
                }
            }
            ClientCommand::StartIterationPolling => self.start_iteration_polling(),
            ClientCommand::StopIterationPolling => {
                if self.iteration_polling.take().is_some() {
                    vibe_info!("Iteration polling stopped");
                }
            }
            ClientCommand::FetchIterationDiff { iteration_id } => {
                self.spawn_call(move |backend, sink| async move {
                    let result = backend.iteration_diff(&iteration_id).await;
                    sink.emit(ClientEvent::IterationDiffLoaded {
                        iteration_id,
                        result,
                    });
                })
            }
            ClientCommand::ListRules => self.spawn_call(|backend, sink| async move {
                sink.emit(ClientEvent::RulesLoaded(backend.list_rules().await));
            }),
            ClientCommand::ListRuleTemplates => self.spawn_call(|backend, sink| async move {
                sink.emit(ClientEvent::TemplatesLoaded(
                    backend.list_rule_templates().await,
                ));
            }),
            ClientCommand::ImportRuleTemplate { filename } => {
                self.spawn_call(move |backend, sink| async move {
                    let result = backend.import_rule_template(&filename).await;
                    sink.emit(ClientEvent::TemplateImported(result));
                })
            }
        }
    }

    /// One-shot request; abandoned when the client shuts down.
    fn spawn_call<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn Backend>, Arc<dyn EventSink>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let root = self.root.clone();
        let task = call(self.backend.clone(), self.sink.clone());
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = root.cancelled() => {}
                _ = task => {}
            }
        });
    }

    fn submit_job(&mut self, request: RequestId, body: GenerateRequest) {
        let cancel = self.root.child_token();
        if let Some(previous) = self.jobs.insert(request, cancel.clone()) {
            previous.cancel();
        }
        let backend = self.backend.clone();
        let sink = self.sink.clone();

        self.runtime.spawn(async move {
            let _done = cancel.clone().drop_guard();
            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                submitted = backend.submit_job(&body) => submitted,
            };
            let submission = match submitted {
                Ok(submission) => submission,
                Err(error) => {
                    vibe_warn!("Submission for request {} failed: {}", request, error);
                    sink.emit(ClientEvent::JobRejected { request, error });
                    return;
                }
            };
            vibe_info!(
                "Request {} accepted as job {}",
                request,
                submission.job_id
            );
            sink.emit(ClientEvent::JobSubmitted {
                request,
                job_id: submission.job_id.clone(),
                session_id: submission.session_id,
            });

            let poller = JobPoller::new(backend);
            let progress_sink = sink.clone();
            let mut on_progress = move |update: JobProgressUpdate| {
                progress_sink.emit(ClientEvent::JobProgress { request, update });
            };
            let result = poller
                .run(&submission.job_id, &cancel, &mut on_progress)
                .await;
            if matches!(result, Err(ClientError::Cancelled)) {
                return;
            }
            sink.emit(ClientEvent::JobFinished { request, result });
        });
    }

    fn start_log_stream(&mut self) {
        if self.log_stream.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let streamer = LogStreamer::new(self.backend.clone(), self.settings.log_reconnect_delay);
        let sink = self.sink.clone();
        self.log_stream = Some(ScheduledTask::spawn(
            &self.runtime,
            &self.root,
            move |cancel| async move {
                let mut on_event = move |event: LogEvent| match event {
                    LogEvent::Connected => {
                        sink.emit(ClientEvent::LogStream(LogStreamStatus::Connected))
                    }
                    LogEvent::Record(record) => sink.emit(ClientEvent::LogLine(record)),
                    LogEvent::Disconnected(_) => {
                        sink.emit(ClientEvent::LogStream(LogStreamStatus::Reconnecting))
                    }
                };
                streamer.run(&cancel, &mut on_event).await;
            },
        ));
        vibe_info!("Log stream started");
    }

    /// Restarting replaces the previous poller, which forces a fresh load.
    fn start_iteration_polling(&mut self) {
        let backend = self.backend.clone();
        let sink = self.sink.clone();
        // First tick always loads; later ticks only while an iteration runs.
        let live = Arc::new(AtomicBool::new(true));
        self.iteration_polling = Some(ScheduledTask::every(
            &self.runtime,
            &self.root,
            self.settings.dashboard_poll_interval,
            move || {
                let backend = backend.clone();
                let sink = sink.clone();
                let live = live.clone();
                async move {
                    if !live.load(Ordering::Relaxed) {
                        return;
                    }
                    let history = backend.iteration_history().await;
                    match &history {
                        Ok(history) => live.store(history.is_live(), Ordering::Relaxed),
                        Err(err) => vibe_warn!("Failed to load iteration history: {}", err),
                    }
                    sink.emit(ClientEvent::IterationsLoaded(history));
                }
            },
        ));
        vibe_info!(
            "Iteration polling every {:?}",
            self.settings.dashboard_poll_interval
        );
    }
}
