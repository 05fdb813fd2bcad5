use crate::config::RelayConfig;
use crate::protocol::ProviderRequest;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Proxy;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Header carrying the provider credential.
pub const API_KEY_HEADER: &str = "api-key";
/// Correlation id forwarded upstream. Providers echo it in their logs.
pub const REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

pub struct HttpTransport {
    client: reqwest::Client,
    chat_url: Url,
    api_key: String,
    response_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from a validated configuration.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::configuration_with_context(
                "API key is required to build the transport",
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_source("http_transport"),
            )
        })?;
        let chat_url = Self::chat_completions_url(config)?;

        // No overall request timeout: it would cut long answers mid-stream.
        // Header and idle deadlines are enforced by the relay instead.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.response_timeout())
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy URL: {}", e),
                    ErrorContext::new()
                        .with_field_path("proxy_url")
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            chat_url,
            api_key,
            response_timeout: config.response_timeout(),
        })
    }

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
    pub fn chat_completions_url(config: &RelayConfig) -> Result<Url> {
        let endpoint = config.endpoint.as_deref().unwrap_or("").trim_end_matches('/');
        let raw = format!(
            "{}/openai/deployments/{}/chat/completions",
            endpoint, config.deployment_id
        );
        let mut url = Url::parse(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot build chat completions URL: {}", e),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(raw.clone())
                    .with_source("http_transport"),
            )
        })?;
        url.query_pairs_mut()
            .append_pair("api-version", &config.api_version);
        Ok(url)
    }

    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// POST the request and hand back the raw response, whatever its status.
    pub async fn execute_stream_response(
        &self,
        body: &ProviderRequest,
        client_request_id: &str,
    ) -> Result<reqwest::Response> {
        let accept = if body.stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        self.client
            .post(self.chat_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .header("accept", accept)
            .header(REQUEST_ID_HEADER, client_request_id)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// Convert a successful streaming response into a byte stream.
    pub fn into_byte_stream(resp: reqwest::Response) -> BoxStream<'static, Bytes> {
        Box::pin(
            resp.bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e))),
        )
    }

    /// Body of a rejected request, read for at most `limit`.
    ///
    /// Falls back to the status reason when the body stalls or cannot be read.
    pub async fn error_message(resp: reqwest::Response, limit: Duration) -> String {
        let status = resp.status();
        let fallback = || status.canonical_reason().unwrap_or_default().to_string();
        match tokio::time::timeout(limit, resp.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "could not read provider error body");
                fallback()
            }
            Err(_) => {
                warn!(
                    limit_ms = limit.as_millis() as u64,
                    "provider error body stalled"
                );
                fallback()
            }
        }
    }

    /// Non-streaming call; non-success statuses become [`Error::Remote`].
    pub async fn execute_json(
        &self,
        body: &ProviderRequest,
        client_request_id: &str,
    ) -> Result<serde_json::Value> {
        let resp = self.execute_stream_response(body, client_request_id).await?;
        let status = resp.status();
        if !status.is_success() {
            let message = Self::error_message(resp, self.response_timeout).await;
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        resp.json()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_deployment_and_version() {
        let config = RelayConfig {
            endpoint: Some("https://res.openai.azure.com/".into()),
            api_key: Some("k".into()),
            ..RelayConfig::default()
        };
        let url = HttpTransport::chat_completions_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let config = RelayConfig {
            endpoint: Some("https://res.openai.azure.com".into()),
            ..RelayConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(Error::Configuration { .. })
        ));
    }
}
