//! Upstream chunks and downstream relay events.

use bytes::Bytes;

/// Literal payload marking the end of an event stream, both upstream and downstream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of the provider's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderChunk {
    /// Incremental content fragment (never empty).
    Delta(String),
    /// The first choice reported a finish reason; no more content follows.
    Finished(String),
    /// The provider sent the done sentinel.
    Done,
}

impl ProviderChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderChunk::Finished(_) | ProviderChunk::Done)
    }
}

/// Simplified event sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Incremental text.
    Content(String),
    /// Terminal marker. `error` is set when the stream ended because something failed;
    /// the wire frame is the bare sentinel either way.
    Done { error: Option<String> },
}

impl RelayEvent {
    pub fn done() -> Self {
        RelayEvent::Done { error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        RelayEvent::Done {
            error: Some(error.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            RelayEvent::Content(text) => Some(text.as_str()),
            RelayEvent::Done { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RelayEvent::Done { error } => error.as_deref(),
            RelayEvent::Content(_) => None,
        }
    }

    /// Server-sent-event frame: `data: <payload>\n\n`.
    pub fn to_frame(&self) -> Bytes {
        let payload = match self {
            RelayEvent::Content(text) => serde_json::json!({ "content": text }).to_string(),
            RelayEvent::Done { .. } => DONE_SENTINEL.to_string(),
        };
        Bytes::from(format!("data: {}\n\n", payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames() {
        assert_eq!(
            RelayEvent::Content("Hello \"you\"".into()).to_frame(),
            Bytes::from_static(b"data: {\"content\":\"Hello \\\"you\\\"\"}\n\n")
        );
        assert_eq!(
            RelayEvent::failed("upstream closed").to_frame(),
            Bytes::from_static(b"data: [DONE]\n\n")
        );
    }

    #[test]
    fn accessors() {
        let ev = RelayEvent::Content("x".into());
        assert!(!ev.is_terminal());
        assert_eq!(ev.content(), Some("x"));
        assert_eq!(RelayEvent::failed("boom").error(), Some("boom"));
        assert!(RelayEvent::done().is_terminal());
        assert!(ProviderChunk::Finished("stop".into()).is_terminal());
        assert!(!ProviderChunk::Delta("a".into()).is_terminal());
    }
}
