use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::role::Role;

/// Lifecycle of an assistant reply as its fragments arrive. User messages are
/// always `Complete`. The status only leaves `Complete` while a reply is in
/// flight, so persisted records omit the field for the common case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Errored,
}

impl MessageStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, MessageStatus::Complete)
    }

    /// True for `Pending` and `Streaming`, the states a crashed session can
    /// leave behind in the store.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Streaming)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, MessageStatus::Errored)
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        MessageStatus::Complete
    }
}

/// A single turn in the conversation: text content plus an optional inline
/// image, attributed to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "MessageStatus::is_complete")]
    pub status: MessageStatus,
}

impl Message {
    pub fn user() -> Self {
        Message {
            role: Role::User,
            content: String::new(),
            attachment: None,
            status: MessageStatus::Complete,
        }
    }

    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            content: String::new(),
            attachment: None,
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant message awaiting its first streamed fragment.
    pub fn pending_assistant() -> Self {
        Message {
            status: MessageStatus::Pending,
            ..Message::assistant()
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = text.into();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Whether the message carries anything worth sending upstream.
    pub fn has_substance(&self) -> bool {
        !self.content.trim().is_empty() || self.attachment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_complete_messages() {
        let message = Message::user().with_text("허리가 아파요");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "허리가 아파요");
        assert_eq!(message.status, MessageStatus::Complete);
        assert!(message.attachment.is_none());
    }

    #[test]
    fn pending_assistant_is_in_flight() {
        let message = Message::pending_assistant();
        assert!(message.status.is_in_flight());
        assert!(message.content.is_empty());
    }

    #[test]
    fn complete_status_is_omitted_from_json() {
        let message = Message::user().with_text("hello");
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("status").is_none());
        assert!(json.get("attachment").is_none());

        let errored = Message {
            status: MessageStatus::Errored,
            ..Message::assistant().with_text("partial")
        };
        let json = serde_json::to_value(&errored).unwrap();
        assert_eq!(json["status"], "errored");
    }

    #[test]
    fn missing_status_deserializes_as_complete() {
        let message: Message =
            serde_json::from_str(r#"{"role": "model", "content": "안녕하세요"}"#).unwrap();
        assert_eq!(message.status, MessageStatus::Complete);
    }

    #[test]
    fn substance_requires_text_or_attachment() {
        assert!(!Message::user().has_substance());
        assert!(!Message::user().with_text("   ").has_substance());
        assert!(Message::user().with_text("x").has_substance());
        assert!(Message::user()
            .with_attachment(Attachment::new("image/png", "AAAA"))
            .has_substance());
    }
}
