use crate::config::RelayConfig;
use crate::pipeline::{self, RelayStream};
use crate::protocol::ProviderRequest;
use crate::transport::HttpTransport;
use crate::types::request::ChatRequest;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Bridges one client chat turn to the streaming chat-completions provider.
///
/// Holds no per-request state; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct StreamRelay {
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) transport: Arc<HttpTransport>,
}

impl StreamRelay {
    /// Validate `config` and build the relay. A missing API key fails here.
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Open the upstream stream.
    ///
    /// Every failure before the first byte is read surfaces as an error here:
    /// invalid request, connection failure, header timeout, or non-success status.
    /// Once this returns `Ok`, failures only ever show up as a terminal event.
    pub async fn open(&self, request: &ChatRequest) -> Result<RelayStream> {
        request.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let body = ProviderRequest::compose(&self.config, request, true);
        let start = Instant::now();

        info!(
            request_id = %request_id,
            prior_turns = request.prior_turns.len(),
            has_image = request.image().is_some(),
            "relay request started"
        );

        let timeout = self.config.response_timeout();
        let resp = match tokio::time::timeout(
            timeout,
            self.transport.execute_stream_response(&body, &request_id),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(request_id = %request_id, error = %e, "provider unreachable");
                return Err(e);
            }
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "provider did not answer in time"
                );
                return Err(Error::Timeout {
                    stage: "upstream response headers".to_string(),
                    elapsed: start.elapsed(),
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            // The header wait and the error body share one deadline.
            let remaining = timeout.saturating_sub(start.elapsed());
            let message = HttpTransport::error_message(resp, remaining).await;
            warn!(
                request_id = %request_id,
                http_status = status.as_u16(),
                body = %message,
                duration_ms = start.elapsed().as_millis() as u64,
                "provider rejected streaming request"
            );
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        info!(
            request_id = %request_id,
            http_status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "upstream stream opened"
        );

        Ok(pipeline::relay_body(
            HttpTransport::into_byte_stream(resp),
            Some(self.config.idle_timeout()),
            request_id,
        ))
    }

    /// Like [`open`](Self::open), but never fails: an error before streaming
    /// degrades into a stream holding a single error-carrying terminal marker.
    pub async fn stream(&self, request: &ChatRequest) -> RelayStream {
        match self.open(request).await {
            Ok(stream) => stream,
            Err(e) => RelayStream::terminated(Some(e.to_string())),
        }
    }
}
