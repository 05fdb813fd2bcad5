//! 协议层：构造发往上游聊天补全接口的请求。
//!
//! # Provider Protocol Layer
//!
//! Turns a client [`ChatRequest`](crate::types::ChatRequest) into the body of a
//! chat-completions call: the fixed assistant persona first, prior turns in their
//! original order, then the new user turn (multi-part when an image is attached),
//! followed by the sampling parameters from configuration.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`persona`] | Built-in system instruction |
//! | [`request`] | [`ProviderRequest`] composition |

pub mod persona;
pub mod request;

pub use persona::DEFAULT_SYSTEM_PROMPT;
pub use request::{compose_messages, ProviderRequest};
