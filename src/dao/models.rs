//! Entities shared between the service layer and the storage backends.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a poll. The only legal transition is active → ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    /// Poll is open for votes.
    Active,
    /// Poll is closed; terminal state.
    Ended,
}

/// One answer option attached to a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOptionEntity {
    /// Short opaque identifier, unique within the poll.
    pub id: String,
    /// Display text of the option.
    pub text: String,
    /// Whether the teacher marked this option as the correct answer.
    pub is_correct: bool,
}

/// Aggregate poll entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollEntity {
    /// Primary key of the poll.
    pub id: Uuid,
    /// Question shown to students.
    pub question: String,
    /// Ordered answer options (always at least 2).
    pub options: Vec<PollOptionEntity>,
    /// Countdown duration in seconds.
    pub duration_sec: u32,
    /// Instant the poll was opened.
    pub started_at: SystemTime,
    /// Current lifecycle status.
    pub status: PollStatus,
    /// Set exactly once, when the poll ends.
    pub ended_at: Option<SystemTime>,
    /// Students whose answers gate the early-end decision. Snapshotted at
    /// creation and extended by mid-poll joins; never restricts who may vote.
    pub eligible_student_keys: Vec<String>,
}

impl PollEntity {
    /// Whether the wall clock has passed `started_at + duration_sec`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        let elapsed = now
            .duration_since(self.started_at)
            .unwrap_or(std::time::Duration::ZERO);
        elapsed.as_secs() >= u64::from(self.duration_sec)
    }

    /// Whether `option_id` belongs to this poll's option set.
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// A single recorded vote. `(poll_id, student_key)` is unique store-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Poll this vote belongs to.
    pub poll_id: Uuid,
    /// Identity of the voting student.
    pub student_key: String,
    /// Display name at the time of voting.
    pub student_name: String,
    /// Chosen option id.
    pub option_id: String,
    /// Instant the vote was recorded.
    pub voted_at: SystemTime,
}

/// Participation status of a student. Kicked is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    /// Student may vote and chat.
    Active,
    /// Student was removed by the teacher; rejoining preserves this.
    Kicked,
}

/// A student known to the session, keyed by a client-chosen identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentEntity {
    /// Opaque unique identity chosen by the client.
    pub student_key: String,
    /// Display name, last write wins.
    pub name: String,
    /// Participation status.
    pub status: StudentStatus,
    /// Instant the student was kicked, if ever.
    pub kicked_at: Option<SystemTime>,
    /// Updated on every join.
    pub last_seen_at: SystemTime,
}

impl StudentEntity {
    /// Whether this student has been removed by the teacher.
    pub fn is_kicked(&self) -> bool {
        self.status == StudentStatus::Kicked
    }
}

/// A chat message, persisted when scoped to a poll and the store is reachable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageEntity {
    /// Short opaque message identifier.
    pub id: String,
    /// Poll the message is scoped to; unscoped messages only live in memory.
    pub poll_id: Option<Uuid>,
    /// Sender identity.
    pub from_key: String,
    /// Sender display name.
    pub from_name: String,
    /// Message body, 1..=300 characters after trimming.
    pub text: String,
    /// Instant the message was accepted.
    pub ts: SystemTime,
}
