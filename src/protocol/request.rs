//! Outbound request composition

use crate::config::{GenerationParams, RelayConfig};
use crate::protocol::persona::DEFAULT_SYSTEM_PROMPT;
use crate::types::message::Message;
use crate::types::request::ChatRequest;
use serde::Serialize;

/// Body of a chat-completions call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub generation: GenerationParams,
    pub stream: bool,
}

impl ProviderRequest {
    /// System instruction, then prior turns in order, then the new user turn.
    pub fn compose(config: &RelayConfig, request: &ChatRequest, stream: bool) -> Self {
        let system_prompt = config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        Self {
            messages: compose_messages(system_prompt, request),
            generation: config.generation.clone(),
            stream,
        }
    }
}

pub fn compose_messages(system_prompt: &str, request: &ChatRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(request.prior_turns.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(request.prior_turns.iter().map(|turn| turn.to_message()));

    let user = match request.image() {
        Some(image) => Message::user_with_image(request.message.clone(), image),
        None => Message::user(request.message.clone()),
    };
    messages.push(user);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::request::ConversationTurn;
    use crate::types::MessageRole;
    use serde_json::json;

    #[test]
    fn composition_order() {
        let request = ChatRequest::new("and now?").with_prior_turns(vec![
            ConversationTurn::user("first"),
            ConversationTurn::assistant("reply"),
        ]);
        let messages = compose_messages("sys", &request);

        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(messages[0], Message::system("sys"));
        assert_eq!(messages[1], Message::user("first"));
        assert_eq!(messages[3], Message::user("and now?"));
    }

    #[test]
    fn body_carries_generation_params_and_stream_flag() {
        let config = RelayConfig::default();
        let body = ProviderRequest::compose(&config, &ChatRequest::new("hi"), true);
        let v = serde_json::to_value(&body).unwrap();

        assert_eq!(v["max_tokens"], json!(1500));
        assert_eq!(v["temperature"], json!(0.3));
        assert_eq!(v["top_p"], json!(0.95));
        assert_eq!(v["frequency_penalty"], json!(0.0));
        assert_eq!(v["presence_penalty"], json!(0.0));
        assert_eq!(v["stream"], json!(true));
        assert_eq!(v["messages"][0]["content"], json!(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(v["messages"][1], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn custom_system_prompt_and_image() {
        let config = RelayConfig {
            system_prompt: Some("custom".into()),
            ..RelayConfig::default()
        };
        let request = ChatRequest::new("look").with_image("https://img.example/a.png");
        let body = ProviderRequest::compose(&config, &request, false);

        assert_eq!(body.messages[0], Message::system("custom"));
        assert!(body.messages[1].contains_image());
        assert!(!body.stream);
    }
}
