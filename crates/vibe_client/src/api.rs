use eventsource_stream::Eventsource;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use vibe_logging::{preview, vibe_debug};

use crate::types::{
    DockerStatus, ImportTemplateRequest, ImportTemplateResponse, IterationDiff, RefineRequest,
    RefineResponse, RulesResponse, SubmitResponse, TemplatesResponse,
};
use crate::{
    ClientError, ClientSettings, CommitRecord, CommitsRequest, DiffPayload, DiffRequest,
    GenerateRequest, IterationHistory, JobResult, JobStatusEvent, LogRecord, RulePayload,
    RuleTemplate, SubmitRoute, TestResults, TestRunRequest,
};

/// Decoded server-push events. Undecodable payloads surface as
/// `ClientError::Decode` items; the stream keeps going after them.
pub type EventStream<T> = BoxStream<'static, Result<T, ClientError>>;

/// Accepted job submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    pub session_id: Option<String>,
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn submit_job(&self, request: &GenerateRequest) -> Result<Submission, ClientError>;

    async fn job_events(&self, job_id: &str) -> Result<EventStream<JobStatusEvent>, ClientError>;

    async fn fetch_result(&self, job_id: &str) -> Result<JobResult, ClientError>;

    async fn refine_prompt(&self, prompt: &str, repo_url: &str) -> Result<String, ClientError>;

    async fn run_tests(&self, request: &TestRunRequest) -> Result<TestResults, ClientError>;

    async fn commits(&self, request: &CommitsRequest) -> Result<Vec<CommitRecord>, ClientError>;

    async fn diff(&self, request: &DiffRequest) -> Result<DiffPayload, ClientError>;

    async fn check_docker(&self) -> Result<bool, ClientError>;

    async fn log_events(&self) -> Result<EventStream<LogRecord>, ClientError>;

    async fn iteration_history(&self) -> Result<IterationHistory, ClientError>;

    /// HTML diff of one iteration, `None` when it changed nothing.
    async fn iteration_diff(&self, iteration_id: &str) -> Result<Option<String>, ClientError>;

    async fn list_rules(&self) -> Result<Vec<RulePayload>, ClientError>;

    async fn list_rule_templates(&self) -> Result<Vec<RuleTemplate>, ClientError>;

    /// Returns the file name the template was imported as.
    async fn import_rule_template(&self, filename: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl ReqwestBackend {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        settings.endpoint("")?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.settings.endpoint(path)?;
        Ok(self.client.get(url).timeout(self.settings.request_timeout))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.settings.endpoint(path)?;
        Ok(self.client.post(url).timeout(self.settings.request_timeout))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = checked(request.send().await?).await?;
        let body = response.text().await?;
        vibe_debug!("Response body: {}", preview(&body, 200));
        Ok(serde_json::from_str(&body)?)
    }

    /// Opens an SSE stream. No overall timeout: the stream lives until the
    /// server closes it or the caller drops it.
    async fn events<T>(&self, path: &str) -> Result<EventStream<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.settings.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = checked(response).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(serde_json::from_str::<T>(&event.data).map_err(|err| {
                        ClientError::Decode(format!("{err} in {}", preview(&event.data, 80)))
                    })),
                    Err(err) => Some(Err(ClientError::Stream(err.to_string()))),
                }
            });
        Ok(stream.boxed())
    }
}

/// Maps non-success statuses to `HttpStatus`, preferring the backend's own
/// `error` message when the body carries one.
async fn checked(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| error_field(&value))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    Err(ClientError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

fn error_field(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|error| !error.is_empty())
        .map(ToOwned::to_owned)
}

/// Some endpoints wrap their payload as `{"<key>": payload}`, others return
/// it bare. Either way a top-level `error` string wins.
fn unwrap_payload<T: DeserializeOwned>(value: Value, key: &str) -> Result<T, ClientError> {
    if let Some(error) = error_field(&value) {
        return Err(ClientError::Business(error));
    }
    let payload = match value {
        Value::Object(mut map) if map.get(key).is_some_and(|inner| !inner.is_null()) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    };
    payload_of(payload)
}

fn payload_of<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    if let Some(error) = error_field(&value) {
        return Err(ClientError::Business(error));
    }
    Ok(serde_json::from_value(value)?)
}

fn rejected(error: Option<String>, fallback: &str) -> ClientError {
    ClientError::Business(
        error
            .filter(|error| !error.is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    )
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn submit_job(&self, request: &GenerateRequest) -> Result<Submission, ClientError> {
        let builder = match self.settings.submit_route {
            SubmitRoute::GenerateContext => self.post("api/generate_context")?.json(request),
            SubmitRoute::Analyze => self.post("api/analyze")?.form(request),
        };
        let response: SubmitResponse = self.json(builder).await?;
        if response.success == Some(false) {
            return Err(rejected(response.error, "Failed to generate context"));
        }
        match response.job_id.filter(|id| !id.is_empty()) {
            Some(job_id) => Ok(Submission {
                job_id,
                session_id: response.session_id.filter(|id| !id.is_empty()),
            }),
            None => Err(rejected(response.error, "Backend did not return a job id")),
        }
    }

    async fn job_events(&self, job_id: &str) -> Result<EventStream<JobStatusEvent>, ClientError> {
        let path = format!("{}/{job_id}", self.settings.status_route.prefix());
        self.events(&path).await
    }

    async fn fetch_result(&self, job_id: &str) -> Result<JobResult, ClientError> {
        let value: Value = self.json(self.get(&format!("api/result/{job_id}"))?).await?;
        unwrap_payload(value, "result")
    }

    async fn refine_prompt(&self, prompt: &str, repo_url: &str) -> Result<String, ClientError> {
        let builder = self
            .post("api/refine_prompt_v2")?
            .json(&RefineRequest { prompt, repo_url });
        let response: RefineResponse = self.json(builder).await?;
        match response.refined_prompt {
            Some(refined) if response.success => Ok(refined),
            _ => Err(rejected(response.error, "Failed to refine prompt")),
        }
    }

    async fn run_tests(&self, request: &TestRunRequest) -> Result<TestResults, ClientError> {
        let value: Value = self.json(self.post("api/run-tests")?.json(request)).await?;
        unwrap_payload(value, "results")
    }

    async fn commits(&self, request: &CommitsRequest) -> Result<Vec<CommitRecord>, ClientError> {
        let value: Value = self.json(self.post("api/get-commits")?.json(request)).await?;
        unwrap_payload(value, "commits")
    }

    async fn diff(&self, request: &DiffRequest) -> Result<DiffPayload, ClientError> {
        let value: Value = self.json(self.post("api/get-diff")?.json(request)).await?;
        payload_of(value)
    }

    async fn check_docker(&self) -> Result<bool, ClientError> {
        let status: DockerStatus = self.json(self.get("api/check-docker")?).await?;
        Ok(status.can_use_docker)
    }

    async fn log_events(&self) -> Result<EventStream<LogRecord>, ClientError> {
        self.events("api/logs/stream").await
    }

    async fn iteration_history(&self) -> Result<IterationHistory, ClientError> {
        self.json(self.get("api/iterations/history")?).await
    }

    async fn iteration_diff(&self, iteration_id: &str) -> Result<Option<String>, ClientError> {
        let diff: IterationDiff = self
            .json(self.get(&format!("api/iterations/{iteration_id}/diff"))?)
            .await?;
        Ok(diff.html_diff.filter(|html| !html.is_empty()))
    }

    async fn list_rules(&self) -> Result<Vec<RulePayload>, ClientError> {
        let response: RulesResponse = self.json(self.get("api/list-rules")?).await?;
        if !response.success {
            return Err(rejected(response.error, "Failed to load rules"));
        }
        Ok(response.rules)
    }

    async fn list_rule_templates(&self) -> Result<Vec<RuleTemplate>, ClientError> {
        let response: TemplatesResponse = self.json(self.get("api/list-rule-templates")?).await?;
        if !response.success {
            return Err(rejected(response.error, "Failed to load templates"));
        }
        Ok(response.templates)
    }

    async fn import_rule_template(&self, filename: &str) -> Result<String, ClientError> {
        let builder = self
            .post("api/import-rule-template")?
            .json(&ImportTemplateRequest {
                template_filename: filename,
            });
        let response: ImportTemplateResponse = self.json(builder).await?;
        match response.imported_as {
            Some(imported_as) if response.success => Ok(imported_as),
            _ => Err(rejected(response.error, "Failed to import template")),
        }
    }
}
