//! Vibe Coder client: backend access over HTTP/SSE, job polling, background
//! tasks and local key/value storage.
mod api;
mod error;
mod handle;
mod logs;
mod poller;
mod schedule;
mod settings;
mod storage;
mod types;

pub use api::{Backend, EventStream, ReqwestBackend, Submission};
pub use error::{ClientError, FailureKind};
pub use handle::{ChannelEventSink, ClientEvent, ClientHandle, EventSink, LogStreamStatus};
pub use logs::{LogEvent, LogStreamer};
pub use poller::{
    phase_progress, JobPoller, JobProgressUpdate, JobStream, StreamVerdict,
    CONNECTION_LOST_MESSAGE,
};
pub use schedule::ScheduledTask;
pub use settings::{ClientSettings, StatusRoute, SubmitRoute};
pub use storage::{
    ensure_state_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, StorageError,
    StoreSettings,
};
pub use types::{
    CommitRecord, CommitsRequest, DiffPayload, DiffRequest, GenerateRequest, IterationErrorPayload,
    IterationHistory, IterationPayload, IterationStepPayload, JobResult, JobStats, JobStatusEvent,
    LogRecord, RequestId, RulePayload, RuleTemplate, SkippedFileRecord, TestDetail, TestResults,
    TestRunRequest,
};
