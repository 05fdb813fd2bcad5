//! Network transport to the chat-completions provider.

pub mod http;

pub use http::{HttpTransport, TransportError};
