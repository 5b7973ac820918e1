//! Participant payloads for joins, kicks, and roster updates.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::StudentEntity;
use crate::dto::epoch_ms;

/// Student handshake announcing identity and display name.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentJoinPayload {
    /// Client-chosen stable identity.
    #[validate(length(min = 1, max = 64))]
    pub student_key: String,
    /// Display name, last write wins.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
}

/// Teacher request to remove a student from the session.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KickPayload {
    /// Identity of the student to remove.
    #[validate(length(min = 1, max = 64))]
    pub student_key: String,
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Student identity.
    pub student_key: String,
    /// Display name.
    pub name: String,
    /// Last join instant in epoch milliseconds.
    pub last_seen_at: i64,
}

impl From<StudentEntity> for ParticipantInfo {
    fn from(value: StudentEntity) -> Self {
        Self {
            student_key: value.student_key,
            name: value.name,
            last_seen_at: epoch_ms(value.last_seen_at),
        }
    }
}

/// Roster broadcast after every join, disconnect, or kick.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterPayload {
    /// Non-kicked students, most recently seen first.
    pub participants: Vec<ParticipantInfo>,
}
