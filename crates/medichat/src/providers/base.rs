use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::{ProviderError, ProviderResult};
use crate::models::conversation::Conversation;
use crate::models::message::Message;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Everything one generation call needs: the system instruction, the prior
/// turns, and the message being answered. The provider wire format treats the
/// last message differently from the rest, so the split happens here once
/// instead of in every provider.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub history: Vec<Message>,
    pub prompt: Message,
}

impl GenerateRequest {
    /// Build a request from a transcript. Returns `None` for an empty
    /// conversation, which has no prompt to answer.
    pub fn from_conversation<S: Into<String>>(
        system: S,
        conversation: &Conversation,
    ) -> Option<Self> {
        let (history, prompt) = conversation.split_current()?;
        Some(GenerateRequest {
            system: system.into(),
            history: history.to_vec(),
            prompt: prompt.clone(),
        })
    }
}

/// Fragments of one reply, in order. An `Err` item ends the reply; no further
/// items follow it.
pub type ReplyStream = BoxStream<'static, Result<String, ProviderError>>;

/// A generative-language backend. `complete` waits for the whole reply,
/// `complete_stream` hands back fragments as the provider produces them.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, request: &GenerateRequest) -> ProviderResult<(String, Usage)>;

    async fn complete_stream(&self, request: &GenerateRequest) -> ProviderResult<ReplyStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;

    #[test]
    fn from_conversation_splits_prompt_from_history() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user().with_text("첫 질문"));
        conversation.push(Message::assistant().with_text("첫 답변"));
        conversation.push(Message::user().with_text("두 번째 질문"));

        let request = GenerateRequest::from_conversation("system", &conversation).unwrap();
        assert_eq!(request.system, "system");
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.prompt.content, "두 번째 질문");
    }

    #[test]
    fn from_conversation_on_empty_is_none() {
        assert!(GenerateRequest::from_conversation("system", &Conversation::new()).is_none());
    }
}
