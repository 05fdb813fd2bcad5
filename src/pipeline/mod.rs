//! 流水线处理模块：上游字节流到客户端事件流的转换。
//!
//! # Pipeline Layer
//!
//! Turns the provider's raw response body into the simplified event stream the
//! client consumes. Both stages are lazy: nothing is buffered beyond the current
//! partial line, and each content fragment is forwarded as soon as it is decoded.
//!
//! ```text
//! Raw Bytes → SseLineDecoder → ProviderChunk → RelayStream → RelayEvent → frames
//!     │              │                              │
//!   HTTP        line framing,                 termination guarantee,
//!   body        JSON parsing                  idle timeout, cancellation
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Line-buffered `data:` decoder producing [`ProviderChunk`](crate::types::ProviderChunk)s |
//! | [`relay_stream`] | [`RelayStream`]: exactly one terminal marker, always last |

pub mod decode;
pub mod relay_stream;

pub use decode::SseLineDecoder;
pub use relay_stream::{CancelHandle, RelayStream};

use crate::BoxStream;
use bytes::Bytes;
use std::time::Duration;

/// Decode an upstream body and wrap it into a terminating relay stream.
pub fn relay_body(
    body: BoxStream<'static, Bytes>,
    idle_timeout: Option<Duration>,
    request_id: impl Into<String>,
) -> RelayStream {
    let chunks = SseLineDecoder::default().decode_stream(body);
    RelayStream::from_chunks(chunks, idle_timeout, request_id)
}
