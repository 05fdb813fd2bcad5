//! 会话模块：调用方持有的对话状态与回答汇总。
//!
//! # Session Module
//!
//! The relay is stateless; conversation state lives here, owned by the caller
//! and passed explicitly into each request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ChatSession`] | Append-only list of turns for one conversation |
//! | [`collect_answer`] | Concatenate the content fragments of a relay stream |
//! | [`TranscriptStore`] | Trait for persisting finished exchanges |
//! | [`InMemoryTranscriptStore`] | In-memory store for testing |
//! | [`JsonlTranscriptStore`] | JSON Lines file store |

pub mod store;

pub use store::{InMemoryTranscriptStore, JsonlTranscriptStore, TranscriptRecord, TranscriptStore};

use crate::relay::StreamRelay;
use crate::types::events::RelayEvent;
use crate::types::request::{ChatRequest, ConversationTurn};
use crate::Result;
use futures::{Stream, StreamExt};

/// Full answer assembled from one relay stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedAnswer {
    pub text: String,
    pub fragments: usize,
    /// Error carried by the terminal marker, if any.
    pub error: Option<String>,
}

impl CollectedAnswer {
    /// No content arrived; the client should offer a retry.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Drain `stream`, calling `on_fragment` for each fragment as it arrives.
pub async fn collect_answer_with<S, F>(stream: S, mut on_fragment: F) -> CollectedAnswer
where
    S: Stream<Item = RelayEvent>,
    F: FnMut(&str),
{
    futures::pin_mut!(stream);
    let mut answer = CollectedAnswer::default();
    while let Some(event) = stream.next().await {
        match event {
            RelayEvent::Content(text) => {
                on_fragment(&text);
                answer.text.push_str(&text);
                answer.fragments += 1;
            }
            RelayEvent::Done { error } => {
                answer.error = error;
                break;
            }
        }
    }
    answer
}

pub async fn collect_answer<S>(stream: S) -> CollectedAnswer
where
    S: Stream<Item = RelayEvent>,
{
    collect_answer_with(stream, |_| {}).await
}

/// Caller-owned conversation state.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    user_id: Option<String>,
    turns: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            turns: Vec::new(),
        }
    }

    /// Rebuild a conversation from stored exchanges.
    pub fn resume(user_id: Option<String>, records: &[TranscriptRecord]) -> Self {
        let mut turns = Vec::with_capacity(records.len() * 2);
        for record in records {
            turns.push(ConversationTurn {
                timestamp: Some(record.created_at),
                ..ConversationTurn::user(record.message.clone())
            });
            turns.push(ConversationTurn {
                timestamp: Some(record.created_at),
                ..ConversationTurn::assistant(record.response.clone())
            });
        }
        Self { user_id, turns }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Request for a new turn, carrying every recorded turn as history.
    pub fn prepare(&self, message: impl Into<String>, image: Option<String>) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            image_reference: image,
            prior_turns: self.turns.clone(),
        }
    }

    /// Append the user turn and its answer; returns the record to persist.
    pub fn record_exchange(
        &mut self,
        request: &ChatRequest,
        answer: impl Into<String>,
    ) -> TranscriptRecord {
        let answer = answer.into();
        self.turns.push(ConversationTurn::user(request.message.clone()));
        self.turns.push(ConversationTurn::assistant(answer.clone()));
        TranscriptRecord::new(self.user_id.clone(), request.message.clone(), answer)
    }

    /// Run one full turn: relay, stream fragments to `on_fragment`, record and persist.
    ///
    /// Nothing is recorded when the answer came back empty.
    pub async fn ask<F>(
        &mut self,
        relay: &StreamRelay,
        store: &dyn TranscriptStore,
        message: impl Into<String>,
        image: Option<String>,
        on_fragment: F,
    ) -> Result<CollectedAnswer>
    where
        F: FnMut(&str),
    {
        let request = self.prepare(message, image);
        let stream = relay.open(&request).await?;
        let answer = collect_answer_with(stream, on_fragment).await;

        if !answer.is_empty() {
            let record = self.record_exchange(&request, answer.text.clone());
            store.save(record).await?;
        }
        Ok(answer)
    }
}
