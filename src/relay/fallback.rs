//! 非流式降级模式：一次请求、一次完整回答。
//!
//! Non-streaming fallback: one request, one complete answer, no incremental delivery.

use crate::protocol::ProviderRequest;
use crate::types::request::ChatRequest;
use crate::{Error, Result};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::core::StreamRelay;

impl StreamRelay {
    /// Ask the provider for the whole answer at once.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
        request.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let body = ProviderRequest::compose(&self.config, request, false);
        let timeout = self.config.response_timeout();

        let json = match tokio::time::timeout(timeout, self.transport.execute_json(&body, &request_id))
            .await
        {
            Ok(res) => res.map_err(|e| {
                warn!(request_id = %request_id, error = %e, "fallback request failed");
                e
            })?,
            Err(_) => {
                return Err(Error::Timeout {
                    stage: "non-streaming completion".to_string(),
                    elapsed: timeout,
                })
            }
        };

        let answer = answer_from_completion(&json);
        info!(
            request_id = %request_id,
            answer_len = answer.len(),
            "fallback completion finished"
        );
        Ok(answer)
    }
}

/// `choices[0].message.content`, empty when the provider returned none.
pub fn answer_from_completion(json: &Value) -> String {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
