//! Request and response schemas for the backend HTTP/SSE interface.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Client-side ticket identifying one outstanding request.
pub type RequestId = u64;

/// Body of a context-generation submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub repo_url: String,
    pub repo_branch: String,
    pub vibe: String,
    /// Single-letter stage code, `A` to `D`.
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_planner_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_planner_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SubmitResponse {
    pub success: Option<bool>,
    pub job_id: Option<String>,
    pub session_id: Option<String>,
    pub error: Option<String>,
}

/// One server-push event on a job's status stream.
///
/// Decoding is per field: a field of the wrong type reads as absent instead of
/// failing the whole event, so `error` and `status` are never lost.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct JobStatusEvent {
    pub phase: Option<String>,
    pub current: Option<u32>,
    pub total: Option<u32>,
    pub status: Option<String>,
    pub error: Option<String>,
    /// `None` also when the embedded result does not match `JobResult`.
    pub result: Option<JobResult>,
    pub keepalive: bool,
}

impl From<Value> for JobStatusEvent {
    fn from(value: Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(ToOwned::to_owned);
        let count = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
        };
        let error = match value.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(error)) => Some(error.clone()),
            Some(other) => Some(other.to_string()),
        };
        let result = value
            .get("result")
            .filter(|result| !result.is_null())
            .and_then(|result| serde_json::from_value(result.clone()).ok());

        Self {
            phase: text("phase"),
            current: count("current"),
            total: count("total"),
            status: text("status"),
            error,
            result,
            keepalive: value.get("keepalive").is_some_and(is_truthy),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub files_processed: u64,
    /// Tokens used by the bundle.
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkippedFileRecord {
    pub path: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DiffPayload {
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub content: String,
}

/// Final output of a generation job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub copy_text: String,
    #[serde(default)]
    pub manifest_html: String,
    #[serde(default)]
    pub stats: JobStats,
    #[serde(default)]
    pub skipped_files: Vec<SkippedFileRecord>,
    #[serde(default)]
    pub diff: Option<DiffPayload>,
}

/// One record on the backend log stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl LogRecord {
    pub fn is_heartbeat(&self) -> bool {
        self.kind.as_deref() == Some("heartbeat")
    }

    /// Details as display text; structured details are pretty-printed JSON.
    pub fn details_text(&self) -> Option<String> {
        match self.details.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => serde_json::to_string_pretty(other).ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefineRequest<'a> {
    pub prompt: &'a str,
    pub repo_url: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RefineResponse {
    #[serde(default)]
    pub success: bool,
    pub refined_prompt: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunRequest {
    pub repo_path: String,
    pub session_id: Option<String>,
    pub use_docker: bool,
    pub framework: String,
}

impl TestRunRequest {
    /// Docker preferred, framework detected by the backend.
    pub fn auto(repo_path: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            session_id,
            use_docker: true,
            framework: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestResults {
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub docker: bool,
    #[serde(default)]
    pub details: Vec<TestDetail>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitsRequest {
    pub repo_path: String,
    pub branch: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    #[serde(default)]
    pub author: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRequest {
    pub repo_path: String,
    pub sha: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DockerStatus {
    #[serde(default)]
    pub can_use_docker: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IterationStepPayload {
    #[serde(rename = "step", default)]
    pub name: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IterationErrorPayload {
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub traceback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IterationPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub steps: Vec<IterationStepPayload>,
    #[serde(default)]
    pub errors: Vec<IterationErrorPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IterationHistory {
    #[serde(default)]
    pub iterations: Vec<IterationPayload>,
    #[serde(default)]
    pub current_iteration: Option<IterationPayload>,
}

impl IterationHistory {
    /// True while the current iteration is still running; a missing status
    /// counts as running.
    pub fn is_live(&self) -> bool {
        self.current_iteration.as_ref().is_some_and(|current| {
            let status = current.status.as_deref().unwrap_or("").trim();
            status.is_empty() || status.eq_ignore_ascii_case("in_progress")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IterationDiff {
    pub html_diff: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RulePayload {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleTemplate {
    pub filename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RulesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub rules: Vec<RulePayload>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TemplatesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub templates: Vec<RuleTemplate>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ImportTemplateRequest<'a> {
    pub template_filename: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ImportTemplateResponse {
    #[serde(default)]
    pub success: bool,
    pub imported_as: Option<String>,
    pub error: Option<String>,
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
