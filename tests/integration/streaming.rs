//! Integration tests for streaming and non-streaming replies

use crate::integration::mock_server::{
    delta_line, fast_builder, MockServerFixture, Reply, ScriptedServer, PATH,
};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use storyboard_runtime::types::{CallStatus, GenerationRequest, Message, Usage};
use storyboard_runtime::{ChunkHandler, Error, ErrorClass, Result};

const TIMEOUT: Duration = Duration::from_secs(5);

fn collector(seen: &mut Vec<(String, String)>) -> impl ChunkHandler + '_ {
    move |delta: &str, full: &str| -> Result<()> {
        seen.push((delta.to_string(), full.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn test_deltas_reassemble_in_order() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse_stream(&[
            r#"data: {"delta":"Hel"}"#,
            r#"data: {"delta":"lo"}"#,
            "data: [DONE]",
        ])
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "greet").stream(true);

    let mut seen = Vec::new();
    let mut handler = collector(&mut seen);
    let result = client
        .send(&request, Some(&mut handler), None, TIMEOUT)
        .await
        .unwrap();
    drop(handler);

    assert_eq!(result.content, "Hello");
    assert_eq!(result.status, CallStatus::Success);
    assert_eq!(
        seen,
        vec![
            ("Hel".to_string(), "Hel".to_string()),
            ("lo".to_string(), "Hello".to_string()),
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_frames_with_usage_and_noise() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_sse_stream(&[
            ": keep-alive",
            r#"data: {"choices":[{"delta":{"role":"assistant"},"index":0}]}"#,
            r#"data: {"choices":[{"delta":{"content":"镜头"},"index":0}]}"#,
            "data: {broken json",
            r#"data: {"choices":[{"delta":{"content":"一"},"index":0}],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#,
            "data: [DONE]",
        ])
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "shot list").stream(true);

    let mut deltas = String::new();
    let mut handler = |delta: &str, _full: &str| -> Result<()> {
        deltas.push_str(delta);
        Ok(())
    };
    let result = client
        .send(&request, Some(&mut handler), None, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(result.content, "镜头一");
    assert_eq!(deltas, result.content);
    assert_eq!(result.usage, Some(Usage::new(9, 2)));
}

#[tokio::test]
async fn test_non_streaming_body_parsed_once() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_response(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"FADE IN:"}}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#,
            1,
        )
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "open the scene");

    let mut calls = 0usize;
    let mut handler = |_: &str, _: &str| -> Result<()> {
        calls += 1;
        Ok(())
    };
    let result = client
        .send(&request, Some(&mut handler), None, TIMEOUT)
        .await
        .unwrap();

    assert_eq!(result.content, "FADE IN:");
    assert_eq!(result.usage, Some(Usage::new(3, 2)));
    assert_eq!(calls, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreadable_document_is_protocol_error() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json_response(200, "<html>upstream down</html>", 1)
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "x");

    let err = client.send(&request, None, None, TIMEOUT).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_stream_without_sentinel_completes_and_flushes_last_line() {
    let body = format!("{}data: {{\"delta\":\"b\"}}", delta_line("a"));
    let server = ScriptedServer::start(vec![Reply::Stream(body)]).await;
    let client = fast_builder(&server.base_url)
        .build()
        .unwrap();
    let request = GenerationRequest::text("qwen-plus", "x").stream(true);

    let result = client.send(&request, None, None, TIMEOUT).await.unwrap();
    assert_eq!(result.content, "ab");
}

#[tokio::test]
async fn test_request_body_and_headers() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", PATH)
            .match_header("authorization", "Bearer sk-test")
            .match_header("x-request-id", Matcher::Regex("^[0-9a-f-]{36}$".into()))
            .match_header("accept", "text/event-stream")
            .match_body(Matcher::PartialJson(json!({
                "model": "qwen-plus",
                "stream": true,
                "max_tokens": 4000,
                "messages": [{"role": "user", "content": "ab\ncd"}],
            })))
            .with_status(200)
            .with_body("data: [DONE]\n")
            .expect(1)
            .create_async()
            .await
    };
    let client = fast_builder(&fixture.base_url)
        .api_key("sk-test")
        .build()
        .unwrap();
    let request = GenerationRequest::new("qwen-plus", vec![Message::user("a\u{0001}b\ncd")])
        .unwrap()
        .max_tokens(4000)
        .stream(true);

    let result = client.send(&request, None, None, TIMEOUT).await.unwrap();
    assert_eq!(result.content, "");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_handler_error_ends_the_call() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse_stream(&[
            r#"data: {"delta":"one"}"#,
            r#"data: {"delta":"two"}"#,
            "data: [DONE]",
        ])
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "x").stream(true);

    let mut calls = 0;
    let mut handler = |_: &str, _: &str| -> Result<()> {
        calls += 1;
        Err(Error::callback("display closed"))
    };
    let err = client
        .generate("script", &request, Some(&mut handler), None)
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Callback);
    assert_eq!(calls, 1);
    // Not retried by either layer.
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_request_never_reaches_network() {
    let server = ScriptedServer::start(vec![Reply::Hang]).await;
    let client = fast_builder(&server.base_url)
        .build()
        .unwrap();
    let request = GenerationRequest::text("qwen-plus", "x").temperature(3.5);

    let err = client.send(&request, None, None, TIMEOUT).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidRequest);
    assert_eq!(server.hits(), 0);
}
