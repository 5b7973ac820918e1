//! WebSocket protocol messages.
//!
//! Inbound messages are internally tagged on `type` using the event names
//! clients already speak (`student:join`, `poll:vote`, ...). Every mutating
//! request may carry a `requestId` that is echoed back in the matching ack.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::dto::{
    chat::{ChatClearPayload, ChatClearedPayload, ChatHistoryPayload, ChatMessageDto,
        ChatSendPayload},
    poll::{PollCreatePayload, PollStatePayload, PollUpdatePayload, PollVotePayload},
    student::{KickPayload, RosterPayload, StudentJoinPayload},
};

/// Error returned when an inbound frame cannot be turned into a usable message.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame was not valid JSON or did not match any known event shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame parsed but its payload failed validation.
    #[error("invalid payload: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Messages accepted from WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Student announcing itself; upserts the roster entry.
    #[serde(rename = "student:join")]
    StudentJoin(StudentJoinPayload),
    /// Teacher console attaching; receives state without joining the roster.
    #[serde(rename = "teacher:join")]
    TeacherJoin {},
    /// Teacher opening a new poll.
    #[serde(rename = "poll:create")]
    PollCreate(PollCreatePayload),
    /// Student voting on the active poll.
    #[serde(rename = "poll:vote")]
    PollVote(PollVotePayload),
    /// Teacher removing a student from the session.
    #[serde(rename = "teacher:kick")]
    TeacherKick(KickPayload),
    /// Chat message from any participant.
    #[serde(rename = "chat:send")]
    ChatSend(ChatSendPayload),
    /// Teacher clearing chat history.
    #[serde(rename = "chat:clear")]
    ChatClear(ChatClearPayload),
    /// Any event tag this server does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame and validate its payload in one step.
    pub fn from_json_str(text: &str) -> Result<Self, ParseError> {
        let message: Self = serde_json::from_str(text)?;

        match &message {
            Self::StudentJoin(payload) => payload.validate()?,
            Self::PollCreate(payload) => payload.validate()?,
            Self::PollVote(payload) => payload.validate()?,
            Self::TeacherKick(payload) => payload.validate()?,
            Self::ChatSend(payload) => payload.validate()?,
            Self::TeacherJoin {} | Self::ChatClear(_) | Self::Unknown => {}
        }

        Ok(message)
    }
}

/// Messages pushed to WebSocket clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Canonical poll-state snapshot, sent on join and on every transition.
    #[serde(rename = "poll:active")]
    PollActive(PollStatePayload),
    /// Incremental results after a vote.
    #[serde(rename = "poll:update")]
    PollUpdate(PollUpdatePayload),
    /// Roster refresh after a join, disconnect, or kick.
    #[serde(rename = "participants:update")]
    ParticipantsUpdate(RosterPayload),
    /// Notice delivered to a kicked student before the forced close.
    #[serde(rename = "student:kicked")]
    StudentKicked {
        /// Human-readable removal reason.
        reason: String,
    },
    /// A newly accepted chat message.
    #[serde(rename = "chat:new")]
    ChatNew(ChatMessageDto),
    /// Recent chat backlog pushed on join.
    #[serde(rename = "chat:history")]
    ChatHistory(ChatHistoryPayload),
    /// Confirmation that chat messages were cleared.
    #[serde(rename = "chat:cleared")]
    ChatCleared(ChatClearedPayload),
    /// Non-fatal error addressed to one connection.
    #[serde(rename = "error:message")]
    ErrorMessage {
        /// Human-readable description.
        message: String,
    },
    /// Per-request acknowledgement.
    #[serde(rename = "ack")]
    Ack(AckMessage),
}

/// Acknowledgement correlating a mutating request with its outcome.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AckMessage {
    /// Echo of the client-supplied correlation id.
    pub request_id: Option<Uuid>,
    /// Whether the request took effect.
    #[serde(flatten)]
    pub outcome: AckOutcome,
}

/// Outcome half of an [`AckMessage`].
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AckOutcome {
    /// The request took effect.
    #[serde(rename_all = "camelCase")]
    Confirmed {
        /// Fresh state snapshot, present for poll-affecting requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        poll: Option<PollStatePayload>,
    },
    /// The request was rejected; nothing changed.
    #[serde(rename_all = "camelCase")]
    Rejected {
        /// Human-readable rejection reason.
        reason: String,
    },
}

impl AckMessage {
    /// Build a confirmation without a state snapshot.
    pub fn confirmed(request_id: Option<Uuid>) -> Self {
        Self {
            request_id,
            outcome: AckOutcome::Confirmed { poll: None },
        }
    }

    /// Build a confirmation carrying a fresh poll-state snapshot.
    pub fn confirmed_with_poll(request_id: Option<Uuid>, poll: PollStatePayload) -> Self {
        Self {
            request_id,
            outcome: AckOutcome::Confirmed { poll: Some(poll) },
        }
    }

    /// Build a rejection with a human-readable reason.
    pub fn rejected(request_id: Option<Uuid>, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            outcome: AckOutcome::Rejected {
                reason: reason.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_student_join() {
        let msg = ClientMessage::from_json_str(
            r#"{"type":"student:join","studentKey":"s-1","name":"Ada"}"#,
        )
        .expect("valid join");
        assert!(matches!(msg, ClientMessage::StudentJoin(_)));
    }

    #[test]
    fn test_parse_unknown_tag() {
        let msg = ClientMessage::from_json_str(r#"{"type":"totally:new","x":1}"#)
            .expect("unknown tags parse");
        assert!(matches!(msg, ClientMessage::Unknown));
    }

    #[test]
    fn test_parse_rejects_blank_chat_text() {
        let err = ClientMessage::from_json_str(
            r#"{"type":"chat:send","studentKey":"s-1","name":"Ada","text":"   "}"#,
        );
        assert!(matches!(err, Err(ParseError::Validation(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(
            ClientMessage::from_json_str("not json"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_ack_serialization_flattens_status() {
        let ack = AckMessage::rejected(None, "nope");
        let json = serde_json::to_value(ServerMessage::Ack(ack)).expect("serialize");
        assert_eq!(json["type"], "ack");
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "nope");
    }
}
