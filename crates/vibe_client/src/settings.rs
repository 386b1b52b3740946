use std::time::Duration;

use url::Url;

use crate::ClientError;

/// Where job progress is streamed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusRoute {
    /// `/api/job_status/{id}`
    #[default]
    JobStatus,
    /// `/api/status/{id}`
    Status,
}

impl StatusRoute {
    pub fn prefix(self) -> &'static str {
        match self {
            StatusRoute::JobStatus => "api/job_status",
            StatusRoute::Status => "api/status",
        }
    }
}

/// How a generation job is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitRoute {
    /// JSON body to `/api/generate_context`.
    #[default]
    GenerateContext,
    /// Form body to `/api/analyze`.
    Analyze,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to plain requests; event streams stay open until terminal.
    pub request_timeout: Duration,
    pub log_reconnect_delay: Duration,
    pub dashboard_poll_interval: Duration,
    pub status_route: StatusRoute,
    pub submit_route: SubmitRoute,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            log_reconnect_delay: Duration::from_secs(5),
            dashboard_poll_interval: Duration::from_secs(5),
            status_route: StatusRoute::default(),
            submit_route: SubmitRoute::default(),
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Resolves `path` (no leading slash) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut base = self.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::InvalidUrl(err.to_string()))
    }
}
