//! Abstract contract every durable store backend implements.

pub mod mongodb;

use std::collections::HashMap;
use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{ChatMessageEntity, PollEntity, StudentEntity, VoteEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for polls, votes, students, and chat.
///
/// Every operation fails fast with [`crate::dao::storage::StorageError::Unavailable`]
/// when the backend cannot be reached; writes guarded by unique constraints
/// surface [`crate::dao::storage::StorageError::Duplicate`] so callers can
/// distinguish conflicts from outages.
pub trait PollStore: Send + Sync {
    /// Persist a freshly created poll.
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a poll by id.
    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// The active poll with the most recent start, if any.
    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// The most recently ended poll, if any.
    fn latest_ended_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
    /// Ended polls ordered by start time descending, bounded by `limit`.
    fn list_ended_polls(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>>;
    /// Conditional active→ended transition. Returns `true` only for the call
    /// that actually flipped the status, `false` when it was already ended.
    fn end_poll(&self, id: Uuid, ended_at: SystemTime)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Idempotently add a student key to a poll's eligibility set, provided
    /// the poll is still active. No-op when the key is already present.
    fn add_eligible_student(
        &self,
        poll_id: Uuid,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete all ended polls and their votes, returning the number of polls removed.
    fn clear_ended_polls(&self) -> BoxFuture<'static, StorageResult<u64>>;

    /// Insert a vote. The `(poll_id, student_key)` unique constraint rejects
    /// double votes with a `Duplicate` error; this must be atomic in the store.
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Vote counts grouped by option id for one poll.
    fn count_votes_by_option(
        &self,
        poll_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, u64>>>;
    /// Distinct student keys that voted on one poll.
    fn distinct_voters(&self, poll_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Atomic create-or-update of a student by key. Must never raise a
    /// duplicate-key failure under concurrent identical calls. Returns the
    /// post-upsert entity so callers can observe a preserved kicked status.
    fn upsert_student(
        &self,
        student_key: String,
        name: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<StudentEntity>>;
    /// One-way flip of a student's status to kicked.
    fn kick_student(
        &self,
        student_key: String,
        kicked_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a student by key.
    fn find_student(
        &self,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<StudentEntity>>>;
    /// All non-kicked students, most recently seen first.
    fn list_active_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>>;

    /// Persist one chat message.
    fn insert_chat_message(
        &self,
        message: ChatMessageEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// The `limit` most recent messages, optionally scoped to one poll,
    /// returned oldest first.
    fn recent_chat_messages(
        &self,
        poll_id: Option<Uuid>,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>>;
    /// Delete persisted chat messages for one poll, or all of them.
    fn delete_chat_messages(
        &self,
        poll_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
