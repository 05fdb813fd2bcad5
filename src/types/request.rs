//! Inbound chat request and conversation turns.

use crate::types::message::{Message, MessageRole};
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a conversation turn.
///
/// Narrower than [`MessageRole`]: clients cannot inject system turns through history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<TurnRole> for MessageRole {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => MessageRole::User,
            TurnRole::Assistant => MessageRole::Assistant,
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Provider message for this turn. The timestamp stays local.
    pub fn to_message(&self) -> Message {
        Message::with_content(
            self.role.into(),
            crate::types::message::MessageContent::text(self.content.clone()),
        )
    }
}

/// A single client-initiated chat turn, consumed once by the relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, alias = "msg")]
    pub message: String,
    #[serde(
        default,
        alias = "imageUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_reference: Option<String>,
    #[serde(
        default,
        rename = "conversationHistory",
        alias = "priorTurns",
        deserialize_with = "null_as_empty"
    )]
    pub prior_turns: Vec<ConversationTurn>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ConversationTurn>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ConversationTurn>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image_reference: impl Into<String>) -> Self {
        self.image_reference = Some(image_reference.into());
        self
    }

    pub fn with_prior_turns(mut self, turns: Vec<ConversationTurn>) -> Self {
        self.prior_turns = turns;
        self
    }

    /// The image reference, treating a blank string as absent.
    pub fn image(&self) -> Option<&str> {
        self.image_reference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// A request must carry either text or an image.
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() && self.image().is_none() {
            return Err(Error::validation_with_context(
                "message must not be empty when no image is attached",
                ErrorContext::new()
                    .with_field_path("message")
                    .with_source("request_validator"),
            ));
        }
        Ok(())
    }
}
