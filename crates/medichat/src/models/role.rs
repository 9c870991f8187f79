use serde::{Deserialize, Serialize};

/// Who authored a message. The serialized names are the provider's wire
/// vocabulary: patients are "user" and the assistant is "model". "assistant"
/// is accepted on input for clients that use the conventional name. Anything
/// else fails deserialization, which the relay turns into a client error
/// instead of silently coercing the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(rename = "model", alias = "assistant")]
    Assistant,
}

impl Role {
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Role::Assistant)
    }
}
