//! HTTP route tests driven through the axum router

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use common::{delta, MockProvider};
use serde_json::{json, Value};
use stream_relay::server::{router, UPSTREAM_FAILURE_MESSAGE};
use tower::ServiceExt;

fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_getanswer_streams_reframed_events() {
    let mut provider = MockProvider::new().await;
    let hello = delta("Hello");
    let there = delta(" there");
    let _mock = provider
        .mock_sse_stream(&[&hello, &there, "data: [DONE]"])
        .await;

    let app = router(provider.relay());
    let response = app
        .oneshot(post_json(
            "/api/getanswer",
            json!({"message": "hi", "conversationHistory": []}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-transform"
    );
    assert_eq!(
        body_string(response).await,
        "data: {\"content\":\"Hello\"}\n\ndata: {\"content\":\" there\"}\n\ndata: [DONE]\n\n"
    );
}

#[tokio::test]
async fn test_getanswer_accepts_legacy_field_names() {
    let mut provider = MockProvider::new().await;
    let mock = provider
        .mock_sse_stream_matching(
            json!({"messages": [{"role": "system"}, {"role": "user", "content": "old client"}]}),
            &["data: [DONE]"],
        )
        .await;

    let app = router(provider.relay());
    let response = app
        .oneshot(post_json(
            "/api/getanswer",
            json!({"msg": "old client", "imageUrl": "", "conversationHistory": null}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "data: [DONE]\n\n");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_getanswer_upstream_failure_is_500_json() {
    let mut provider = MockProvider::new().await;
    let _mock = provider
        .mock_error_response(500, r#"{"error":"secret upstream detail"}"#)
        .await;

    let app = router(provider.relay());
    let response = app
        .oneshot(post_json("/api/getanswer", json!({"message": "hi"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body, json!({"error": UPSTREAM_FAILURE_MESSAGE}));
}

#[tokio::test]
async fn test_getanswer_rejects_bad_input() {
    let mut provider = MockProvider::new().await;
    let mock = provider.mock_untouched().await;
    let app = router(provider.relay());

    let malformed = app
        .clone()
        .oneshot(post_json("/api/getanswer", "{not json"))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .oneshot(post_json("/api/getanswer", json!({"message": ""}).to_string()))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    let body = body_json(empty).await;
    assert!(body["error"].as_str().unwrap().contains("Validation"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_chat_returns_whole_answer() {
    let mut provider = MockProvider::new().await;
    let _mock = provider
        .mock_json_response(json!({
            "choices": [{"message": {"role": "assistant", "content": "Rest and fluids."}}]
        }))
        .await;

    let app = router(provider.relay());
    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "flu?"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"answer": "Rest and fluids."}));
}

#[tokio::test]
async fn test_health() {
    let provider = MockProvider::new().await;
    let app = router(provider.relay());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}
