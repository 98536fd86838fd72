//! Integration tests for usage reporting

use crate::integration::mock_server::{
    client_with_recorder, delta_line, MockServerFixture, Reply, ScriptedServer,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use storyboard_runtime::types::{CallStatus, GenerationRequest};
use storyboard_runtime::usage::{UsageRecord, UsageRecorder};
use storyboard_runtime::{Error, ErrorClass, GenerationClientBuilder, Result, RetryPolicy};

#[tokio::test]
async fn test_success_records_reported_usage() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(&[
            r#"data: {"delta":"Shot 1: "}"#,
            r#"data: {"delta":"wide","usage":{"input_tokens":12,"output_tokens":5}}"#,
            "data: [DONE]",
        ])
        .await;
    let (client, recorder) = client_with_recorder(&fixture.base_url);
    let request = GenerationRequest::text("qwen-plus", "storyboard the opening").stream(true);

    client.generate("script", &request, None, None).await.unwrap();

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, "script");
    assert_eq!(record.model, "qwen-plus");
    assert_eq!(record.status, CallStatus::Success);
    assert_eq!(record.prompt_echo, "storyboard the opening");
    assert_eq!(record.response_echo, "Shot 1: wide");
    assert_eq!((record.input_tokens, record.output_tokens), (12, 5));
    assert!(!record.estimated);
    assert_eq!(record.request_id.len(), 36);
}

#[tokio::test]
async fn test_missing_usage_is_estimated() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json_response(
            200,
            r#"{"choices":[{"message":{"content":"雨夜街道"}}]}"#,
            1,
        )
        .await;
    let (client, recorder) = client_with_recorder(&fixture.base_url);
    let request = GenerationRequest::text("qwen-plus", "rainy street");

    client.generate("analysis", &request, None, None).await.unwrap();

    let record = &recorder.records_by_kind("analysis")[0];
    assert!(record.estimated);
    // Four CJK characters, one token each.
    assert_eq!(record.output_tokens, 4);
    assert!(record.input_tokens > 0);
}

#[tokio::test]
async fn test_failure_records_partial_content() {
    let server = ScriptedServer::start(vec![Reply::Truncated(delta_line("INT. ROOF"))]).await;
    let (client, recorder) = client_with_recorder(&server.base_url);
    let request = GenerationRequest::text("qwen-plus", "x").stream(true);

    let mut handler = |_: &str, _: &str| -> Result<()> { Ok(()) };
    let err = client
        .generate("script", &request, Some(&mut handler), None)
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CallStatus::Failed);
    assert_eq!(records[0].response_echo, "INT. ROOF");
}

#[tokio::test]
async fn test_exhausted_retries_record_once() {
    let server = ScriptedServer::start(vec![Reply::Status(500, "down".to_string())]).await;
    let (client, recorder) = client_with_recorder(&server.base_url);
    let request = GenerationRequest::text("qwen-plus", "x");

    client.generate("script", &request, None, None).await.unwrap_err();

    assert_eq!(server.hits(), 9);
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.records()[0].status, CallStatus::Failed);
}

#[tokio::test]
async fn test_invalid_request_records_nothing() {
    let server = ScriptedServer::start(vec![Reply::Hang]).await;
    let (client, recorder) = client_with_recorder(&server.base_url);
    let request = GenerationRequest::text("", "x");

    let err = client.generate("script", &request, None, None).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::InvalidRequest);
    assert!(recorder.is_empty());
}

struct FailingRecorder;

#[async_trait]
impl UsageRecorder for FailingRecorder {
    async fn record(&self, _: UsageRecord) -> Result<()> {
        Err(Error::protocol("ledger offline"))
    }
}

#[tokio::test]
async fn test_recorder_failure_does_not_fail_the_call() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json_response(200, r#"{"choices":[{"message":{"content":"ok"}}]}"#, 1)
        .await;
    let client = GenerationClientBuilder::new()
        .base_url(fixture.base_url.as_str())
        .timeout(Duration::from_secs(5))
        .local_retry(RetryPolicy::none())
        .outer_retry(RetryPolicy::none())
        .usage_recorder(Arc::new(FailingRecorder))
        .build()
        .unwrap();
    let request = GenerationRequest::text("qwen-plus", "x");

    let result = client.generate("script", &request, None, None).await.unwrap();
    assert_eq!(result.content, "ok");
}
