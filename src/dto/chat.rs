//! Chat payloads for the side-channel scoped to polls.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dao::models::ChatMessageEntity;
use crate::dto::epoch_ms;
use crate::dto::validation::validate_chat_text;

/// Client request to send a chat message.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendPayload {
    /// Client correlation id echoed in the ack.
    pub request_id: Option<Uuid>,
    /// Sender identity.
    pub student_key: String,
    /// Sender display name.
    pub name: String,
    /// Message body; trimmed and bounded to 1..=300 characters.
    pub text: String,
    /// Poll the message is scoped to; unscoped messages stay in memory.
    pub poll_id: Option<Uuid>,
}

impl Validate for ChatSendPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.student_key.is_empty() || self.student_key.len() > 64 {
            errors.add("studentKey", ValidationError::new("length"));
        }
        if self.name.is_empty() || self.name.len() > 64 {
            errors.add("name", ValidationError::new("length"));
        }
        if let Err(e) = validate_chat_text(&self.text) {
            errors.add("text", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Teacher request to clear chat messages.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatClearPayload {
    /// Client correlation id echoed in the ack.
    pub request_id: Option<Uuid>,
    /// Clear only this poll's messages, or everything when absent.
    pub poll_id: Option<Uuid>,
}

/// A chat message as delivered to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    /// Opaque message identifier.
    pub id: String,
    /// Poll scope, if any.
    pub poll_id: Option<Uuid>,
    /// Sender identity.
    pub from_key: String,
    /// Sender display name.
    pub from_name: String,
    /// Message body.
    pub text: String,
    /// Acceptance instant in epoch milliseconds.
    pub ts: i64,
}

impl From<ChatMessageEntity> for ChatMessageDto {
    fn from(value: ChatMessageEntity) -> Self {
        Self {
            id: value.id,
            poll_id: value.poll_id,
            from_key: value.from_key,
            from_name: value.from_name,
            text: value.text,
            ts: epoch_ms(value.ts),
        }
    }
}

/// Recent messages pushed on join, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryPayload {
    /// Messages in chronological order.
    pub messages: Vec<ChatMessageDto>,
}

/// Broadcast confirming a chat clear.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatClearedPayload {
    /// The poll that was cleared, or everything when absent.
    pub poll_id: Option<Uuid>,
}
