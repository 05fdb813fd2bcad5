//! Mock provider setup for integration tests

#![allow(dead_code)]

use mockito::{Matcher, Mock, Server, ServerGuard};
use std::time::Duration;
use stream_relay::{StreamRelay, StreamRelayBuilder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";
pub const API_VERSION: &str = "2024-02-15-preview";
pub const CHAT_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

/// Test fixture that manages a mock chat-completions provider
pub struct MockProvider {
    pub server: ServerGuard,
}

impl MockProvider {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// A relay pointed at the mock server.
    pub fn relay(&self) -> StreamRelay {
        StreamRelayBuilder::new()
            .endpoint(self.url())
            .api_key(API_KEY)
            .response_timeout_secs(5)
            .idle_timeout_secs(5)
            .build()
            .expect("relay should build against mock server")
    }

    fn chat_mock(&mut self) -> Mock {
        self.server
            .mock("POST", CHAT_PATH)
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                API_VERSION.into(),
            ))
            .match_header("api-key", API_KEY)
    }

    /// Successful SSE response; each line is followed by a blank line.
    pub async fn mock_sse_stream(&mut self, lines: &[&str]) -> Mock {
        let body: String = lines.iter().map(|line| format!("{}\n\n", line)).collect();
        self.chat_mock()
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    /// SSE response that only matches when the request body contains `expected`.
    pub async fn mock_sse_stream_matching(
        &mut self,
        expected: serde_json::Value,
        lines: &[&str],
    ) -> Mock {
        let body: String = lines.iter().map(|line| format!("{}\n\n", line)).collect();
        self.chat_mock()
            .match_body(Matcher::PartialJson(expected))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    pub async fn mock_json_response(&mut self, body: serde_json::Value) -> Mock {
        self.chat_mock()
            .match_body(Matcher::PartialJson(serde_json::json!({"stream": false})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    pub async fn mock_error_response(&mut self, status: usize, body: &str) -> Mock {
        self.chat_mock()
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// A mock that must never be hit.
    pub async fn mock_untouched(&mut self) -> Mock {
        self.server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await
    }
}

pub fn delta(content: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]})
    )
}

/// Raw TCP provider that writes `response` (possibly nothing) after the first
/// request read, then holds the connection open without sending more.
pub async fn stalled_provider(response: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                if !response.is_empty() {
                    let _ = socket.write_all(response).await;
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });
    format!("http://{}", addr)
}

/// A relay against `endpoint` with a one second header deadline.
pub fn relay_with_short_deadline(endpoint: String) -> StreamRelay {
    StreamRelayBuilder::new()
        .endpoint(endpoint)
        .api_key(API_KEY)
        .response_timeout_secs(1)
        .idle_timeout_secs(1)
        .build()
        .expect("relay should build against stalled server")
}
