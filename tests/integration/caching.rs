//! Integration tests for the cache-aware entry points

use crate::integration::mock_server::{client_with_recorder, fast_builder, MockServerFixture, PATH};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use storyboard_runtime::cache::{CacheConfig, StoreConfig};
use storyboard_runtime::types::GenerationRequest;
use storyboard_runtime::{CacheKind, ResponseCache};

fn document(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
}

#[tokio::test]
async fn test_generate_cached_hits_service_once() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", PATH)
            // Cached calls always go out as a single document.
            .match_body(Matcher::PartialJson(json!({ "stream": false })))
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(document("INT. KITCHEN - NIGHT"))
            .expect(1)
            .create_async()
            .await
    };
    let (client, recorder) = client_with_recorder(&fixture.base_url);
    let params = json!({ "scene": 3, "style": "noir" });
    let request = GenerationRequest::text("qwen-plus", "scene 3, noir").stream(true);

    let first = client
        .generate_cached("script", &params, &request, None)
        .await
        .unwrap();
    let second = client
        .generate_cached("script", &params, &request, None)
        .await
        .unwrap();

    assert_eq!(first, "INT. KITCHEN - NIGHT");
    assert_eq!(second, first);
    // A cache hit is not a generation, so only one usage record.
    assert_eq!(recorder.len(), 1);
    let stats = client.cache().stats(CacheKind::Generation);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_param_key_ignores_field_order() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_response(200, &document("shared"), 1)
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "x");

    let a = client
        .generate_cached("script", &json!({ "a": 1, "b": [1, 2] }), &request, None)
        .await
        .unwrap();
    let b = client
        .generate_cached("script", &json!({ "b": [1, 2], "a": 1 }), &request, None)
        .await
        .unwrap();

    assert_eq!(a, b);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_generation_is_not_cached() {
    let fixture = MockServerFixture::new().await;
    let failing = fixture.mock_json_response(400, r#"{"message":"bad"}"#, 1).await;
    let client = fixture.client();
    let params = json!({ "scene": 1 });
    let request = GenerationRequest::text("qwen-plus", "x");

    let err = client
        .generate_cached("script", &params, &request, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(client.cache().get(CacheKind::Generation, &params).is_none());
    failing.assert_async().await;
}

#[tokio::test]
async fn test_analysis_key_ignores_whitespace() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_response(200, &document(r#"{"characters":2}"#), 1)
        .await;
    let client = fixture.client();
    let request = GenerationRequest::text("qwen-plus", "analyze");

    let first = client
        .analyze_cached(CacheKind::Analysis, "A man   walks.\nA dog barks.", &request, None)
        .await
        .unwrap();
    let second = client
        .analyze_cached(CacheKind::Analysis, "  A man walks. A dog\tbarks. ", &request, None)
        .await
        .unwrap();

    assert_eq!(first, r#"{"characters":2}"#);
    assert_eq!(second, first);
    // Same text under another kind is a separate entry.
    assert!(client
        .cache()
        .get_text(CacheKind::Visualization, "A man walks. A dog barks.")
        .is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_shared_cache_between_clients() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_response(200, &document("from the first client"), 1)
        .await;
    let config = CacheConfig {
        generation: StoreConfig::new(4, 60),
        ..CacheConfig::default()
    };
    let cache = Arc::new(ResponseCache::new(&config));
    let first = fast_builder(&fixture.base_url)
        .cache(cache.clone())
        .build()
        .unwrap();
    let second = fast_builder(&fixture.base_url)
        .cache(cache.clone())
        .build()
        .unwrap();
    let params = json!({ "id": "shared" });
    let request = GenerationRequest::text("qwen-plus", "x");

    first
        .generate_cached("script", &params, &request, None)
        .await
        .unwrap();
    let text = second
        .generate_cached("script", &params, &request, None)
        .await
        .unwrap();

    assert_eq!(text, "from the first client");
    assert_eq!(cache.stats(CacheKind::Generation).capacity, 4);
    mock.assert_async().await;
}
