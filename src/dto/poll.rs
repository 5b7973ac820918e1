//! Poll payloads exchanged over the WebSocket and REST surfaces.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{PollEntity, PollStatus};
use crate::dto::epoch_ms;

/// One poll option as sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionDto {
    /// Opaque option identifier.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Whether the teacher marked this option correct.
    pub is_correct: bool,
}

/// The poll carried inside a state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivePollDto {
    /// Poll identifier.
    pub poll_id: Uuid,
    /// Question text.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<PollOptionDto>,
    /// Countdown duration in seconds.
    pub duration_sec: u32,
    /// Start instant in epoch milliseconds.
    pub started_at: i64,
    /// Lifecycle status at snapshot time.
    pub status: PollStatus,
}

impl From<PollEntity> for ActivePollDto {
    fn from(value: PollEntity) -> Self {
        Self {
            poll_id: value.id,
            question: value.question,
            options: value
                .options
                .into_iter()
                .map(|option| PollOptionDto {
                    id: option.id,
                    text: option.text,
                    is_correct: option.is_correct,
                })
                .collect(),
            duration_sec: value.duration_sec,
            started_at: epoch_ms(value.started_at),
            status: value.status,
        }
    }
}

/// Aggregated result for one option.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    /// Option identifier.
    pub option_id: String,
    /// Display text.
    pub text: String,
    /// Whether this option was marked correct.
    pub is_correct: bool,
    /// Number of votes received.
    pub count: u64,
    /// Rounded share of all votes. Options are rounded independently, so the
    /// column may not sum to exactly 100; that approximation is accepted.
    pub percent: u8,
}

/// Full poll-state snapshot: the single source of truth pushed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollStatePayload {
    /// The current poll, the most recently ended poll, or nothing.
    pub active_poll: Option<ActivePollDto>,
    /// Server wall clock in epoch milliseconds, for client-side skew correction.
    pub server_time: i64,
    /// Aggregated results for `active_poll`, empty when it is absent.
    pub results: Vec<OptionResult>,
}

/// Incremental results broadcast after every vote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdatePayload {
    /// Poll the results belong to.
    pub poll_id: Uuid,
    /// Aggregated results including the new vote.
    pub results: Vec<OptionResult>,
}

/// Teacher request to open a new poll.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollCreatePayload {
    /// Client correlation id echoed in the ack.
    pub request_id: Option<Uuid>,
    /// Question text.
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    /// Raw option texts; empty entries are filtered before id assignment.
    #[validate(length(min = 2, max = 10))]
    pub options: Vec<String>,
    /// Index into `options` of the correct answer, if any.
    pub correct_option_index: Option<usize>,
    /// Countdown duration in seconds.
    #[validate(range(min = 1, max = 3600))]
    pub duration_sec: u32,
}

/// Student request to record a vote.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollVotePayload {
    /// Client correlation id echoed in the ack.
    pub request_id: Option<Uuid>,
    /// Poll being voted on.
    pub poll_id: Uuid,
    /// Voter identity.
    #[validate(length(min = 1, max = 64))]
    pub student_key: String,
    /// Voter display name.
    #[validate(length(min = 1, max = 64))]
    pub student_name: String,
    /// Chosen option.
    #[validate(length(min = 1, max = 32))]
    pub option_id: String,
}

/// One ended poll with its final results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollHistoryItem {
    /// The ended poll.
    pub poll: ActivePollDto,
    /// Its final aggregated results.
    pub results: Vec<OptionResult>,
}

/// Response of the history-clear endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// Number of polls removed.
    pub count: u64,
}
