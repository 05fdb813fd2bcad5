//! 类型系统模块：中继的核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that crosses the relay:
//! what the client sends, what goes to the provider, and what flows back.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatRequest`] | Client chat turn: message, optional image, prior turns |
//! | [`ConversationTurn`] | One user or assistant turn of a conversation |
//! | [`Message`] | Provider `messages` entry with multi-modal content support |
//! | [`ProviderChunk`] | One decoded unit of the provider's event stream |
//! | [`RelayEvent`] | Simplified downstream event (content fragment or terminal marker) |
//!
//! ## Example
//!
//! ```rust
//! use stream_relay::types::{ChatRequest, ConversationTurn, Message};
//!
//! let request = ChatRequest::new("I have a mild fever")
//!     .with_prior_turns(vec![ConversationTurn::user("hello")]);
//! let turn = Message::user_with_image("what is this?", "https://img.example/a.png");
//! assert!(turn.contains_image());
//! # assert!(request.validate().is_ok());
//! ```

pub mod events;
pub mod message;
pub mod request;

pub use events::{ProviderChunk, RelayEvent, DONE_SENTINEL};
pub use message::{ContentBlock, Message, MessageContent, MessageRole};
pub use request::{ChatRequest, ConversationTurn, TurnRole};
