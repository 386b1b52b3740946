use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use vibe_client::{
    ClientError, ClientSettings, JobPoller, JobProgressUpdate, ReqwestBackend, StatusRoute,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|data| format!("data: {data}\n\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn poller(server: &MockServer, route: StatusRoute) -> JobPoller {
    let settings = ClientSettings {
        status_route: route,
        request_timeout: Duration::from_secs(2),
        ..ClientSettings::with_base_url(server.uri())
    };
    JobPoller::new(Arc::new(ReqwestBackend::new(settings).unwrap()))
}

#[tokio::test]
async fn progress_is_monotonic_and_result_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/job-42"))
        .respond_with(sse(&[
            r#"{"phase":"extracting"}"#,
            r#"{"keepalive":true}"#,
            r#"{"phase":"processing","current":3,"total":9}"#,
            r#"{"phase":"analyzing"}"#,
            r##"{"status":"completed","result":{"copy_text":"# Context","stats":{"files_processed":9,"used":1200,"skipped":1}}}"##,
        ]))
        .mount(&server)
        .await;

    let mut updates: Vec<JobProgressUpdate> = Vec::new();
    let result = poller(&server, StatusRoute::JobStatus)
        .run("job-42", &CancellationToken::new(), &mut |update| {
            updates.push(update)
        })
        .await
        .expect("job completes");

    let percents: Vec<u8> = updates.iter().map(|update| update.percent).collect();
    assert_eq!(percents, vec![10, 70, 70]);
    assert_eq!(updates[1].current, Some(3));
    assert_eq!(result.copy_text, "# Context");
    assert_eq!(result.stats.used, 1200);
}

#[tokio::test]
async fn completion_without_result_fetches_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status/job-7"))
        .respond_with(sse(&[r#"{"phase":"completed"}"#]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/result/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "completed",
            "result": {
                "copy_text": "wrapped",
                "skipped_files": [{"path": "big.bin", "reason": "binary"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = poller(&server, StatusRoute::Status)
        .run("job-7", &CancellationToken::new(), &mut |_| {})
        .await
        .expect("job completes");

    assert_eq!(result.copy_text, "wrapped");
    assert_eq!(result.skipped_files[0].path, "big.bin");
}

#[tokio::test]
async fn backend_error_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/job-1"))
        .respond_with(sse(&[
            r#"{"phase":"extracting"}"#,
            r#"{"error":"Repository not found"}"#,
            r#"{"status":"completed"}"#,
        ]))
        .mount(&server)
        .await;

    let err = poller(&server, StatusRoute::JobStatus)
        .run("job-1", &CancellationToken::new(), &mut |_| {})
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::Business("Repository not found".to_string()));
}

#[tokio::test]
async fn error_survives_mistyped_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/job-3"))
        .respond_with(sse(&[r#"{"error":"boom","current":0.5}"#]))
        .mount(&server)
        .await;

    let err = poller(&server, StatusRoute::JobStatus)
        .run("job-3", &CancellationToken::new(), &mut |_| {})
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::Business("boom".to_string()));
}

#[tokio::test]
async fn mistyped_inline_result_is_fetched_instead() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/job-4"))
        .respond_with(sse(&[
            r#"{"status":"completed","result":{"copy_text":"inline","stats":{"used":1200.0}}}"#,
        ]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/result/job-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": {"copy_text": "fetched", "stats": {"used": 1200}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = poller(&server, StatusRoute::JobStatus)
        .run("job-4", &CancellationToken::new(), &mut |_| {})
        .await
        .expect("job completes");

    assert_eq!(result.copy_text, "fetched");
    assert_eq!(result.stats.used, 1200);
}

#[tokio::test]
async fn stream_ending_early_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/job-2"))
        .respond_with(sse(&[r#"{"phase":"extracting"}"#, "not json"]))
        .mount(&server)
        .await;

    let err = poller(&server, StatusRoute::JobStatus)
        .run("job-2", &CancellationToken::new(), &mut |_| {})
        .await
        .unwrap_err();

    assert!(err.kind().is_transport(), "unexpected error {err:?}");
}

#[tokio::test]
async fn missing_job_stream_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": "Job not found"
        })))
        .mount(&server)
        .await;

    let err = poller(&server, StatusRoute::JobStatus)
        .run("gone", &CancellationToken::new(), &mut |_| {})
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::HttpStatus {
            status: 404,
            message: "Job not found".to_string()
        }
    );
}

#[tokio::test]
async fn cancellation_stops_a_silent_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job_status/slow"))
        .respond_with(sse(&[r#"{"phase":"extracting"}"#]).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        poller(&server, StatusRoute::JobStatus).run("slow", &cancel, &mut |_| {}),
    )
    .await
    .expect("cancellation is prompt")
    .unwrap_err();

    assert_eq!(err, ClientError::Cancelled);
}
