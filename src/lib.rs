//! # stream-relay
//!
//! 流式中继：在聊天客户端与托管的聊天补全服务之间转发并重新分帧流式回答。
//!
//! Streaming relay between a browser chat client and a hosted chat-completions
//! provider.
//!
//! ## Overview
//!
//! A client sends one chat turn (message, optional image, prior turns). The relay
//! composes the provider request (fixed assistant persona, history, new turn),
//! opens a streaming call, decodes the provider's `data:`-framed chunks as they
//! arrive, and re-frames each content delta for the client:
//!
//! ```text
//! data: {"content":"Hello"}
//!
//! data: {"content":" there"}
//!
//! data: [DONE]
//! ```
//!
//! ## Guarantees
//!
//! - Exactly one terminal marker per stream, always last, even when the upstream
//!   fails, goes idle, or closes early.
//! - Malformed upstream chunks are logged and skipped, never fatal.
//! - Content fragments keep the provider's order; nothing is buffered beyond the
//!   current partial line.
//! - No state is shared between invocations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use stream_relay::{ChatRequest, RelayEvent, StreamRelayBuilder};
//!
//! #[tokio::main]
//! async fn main() -> stream_relay::Result<()> {
//!     let relay = StreamRelayBuilder::from_env().build()?;
//!
//!     let mut stream = relay.open(&ChatRequest::new("I have a sore throat")).await?;
//!     while let Some(event) = stream.next().await {
//!         if let RelayEvent::Content(text) = event {
//!             print!("{}", text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Layered configuration (defaults, YAML, environment) |
//! | [`types`] | Requests, turns, provider messages, chunks, relay events |
//! | [`protocol`] | Outbound request composition |
//! | [`transport`] | HTTP transport to the provider |
//! | [`pipeline`] | Incremental decoding and the terminating relay stream |
//! | [`relay`] | [`StreamRelay`] and its builder |
//! | [`session`] | Caller-owned conversation state and transcript persistence |
//! | [`server`] | axum HTTP routes |

pub mod config;
pub mod pipeline;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::{GenerationParams, RelayConfig};
pub use pipeline::{CancelHandle, RelayStream};
pub use relay::{StreamRelay, StreamRelayBuilder};
pub use session::{ChatSession, CollectedAnswer, TranscriptRecord, TranscriptStore};
pub use types::{
    events::{ProviderChunk, RelayEvent},
    message::{Message, MessageRole},
    request::{ChatRequest, ConversationTurn, TurnRole},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
