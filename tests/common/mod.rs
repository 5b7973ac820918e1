//! In-memory [`PollStore`] used to drive the services in integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use uuid::Uuid;

use class_pulse_back::config::AppConfig;
use class_pulse_back::dao::models::{
    ChatMessageEntity, PollEntity, PollStatus, StudentEntity, StudentStatus, VoteEntity,
};
use class_pulse_back::dao::poll_store::PollStore;
use class_pulse_back::dao::storage::{StorageError, StorageResult};
use class_pulse_back::state::{AppState, SharedState};

const VOTE_CONSTRAINT: &str = "poll_student_unique_idx";

#[derive(Default)]
struct MemoryInner {
    polls: Vec<PollEntity>,
    votes: Vec<VoteEntity>,
    students: HashMap<String, StudentEntity>,
    chat: Vec<ChatMessageEntity>,
}

/// Mutex-serialized in-memory store with the same constraint semantics as the
/// MongoDB backend: the vote insert is atomic and duplicate-detecting.
#[derive(Clone, Default)]
pub struct MemoryPollStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind an active poll's start so lazy expiry kicks in. Wall-clock
    /// expiry cannot be simulated with a paused runtime clock.
    pub fn backdate_active_poll(&self, by: Duration) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(poll) = inner
            .polls
            .iter_mut()
            .find(|poll| poll.status == PollStatus::Active)
        {
            poll.started_at -= by;
        }
    }

    pub fn vote_count(&self, poll_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.votes.iter().filter(|vote| vote.poll_id == poll_id).count()
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().unwrap().chat.len()
    }

    pub fn poll(&self, poll_id: Uuid) -> Option<PollEntity> {
        let inner = self.inner.lock().unwrap();
        inner.polls.iter().find(|poll| poll.id == poll_id).cloned()
    }

    pub fn seed_student(&self, student_key: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.students.insert(
            student_key.to_string(),
            StudentEntity {
                student_key: student_key.to_string(),
                name: name.to_string(),
                status: StudentStatus::Active,
                kicked_at: None,
                last_seen_at: SystemTime::now(),
            },
        );
    }
}

impl PollStore for MemoryPollStore {
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().unwrap().polls.push(poll);
            Ok(())
        })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.poll(id)) })
    }

    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            Ok(inner
                .polls
                .iter()
                .filter(|poll| poll.status == PollStatus::Active)
                .max_by_key(|poll| poll.started_at)
                .cloned())
        })
    }

    fn latest_ended_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            Ok(inner
                .polls
                .iter()
                .filter(|poll| poll.status == PollStatus::Ended)
                .max_by_key(|poll| poll.ended_at)
                .cloned())
        })
    }

    fn list_ended_polls(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            let mut ended: Vec<PollEntity> = inner
                .polls
                .iter()
                .filter(|poll| poll.status == PollStatus::Ended)
                .cloned()
                .collect();
            ended.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            ended.truncate(limit as usize);
            Ok(ended)
        })
    }

    fn end_poll(
        &self,
        id: Uuid,
        ended_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            let Some(poll) = inner
                .polls
                .iter_mut()
                .find(|poll| poll.id == id && poll.status == PollStatus::Active)
            else {
                return Ok(false);
            };
            poll.status = PollStatus::Ended;
            poll.ended_at = Some(ended_at);
            Ok(true)
        })
    }

    fn add_eligible_student(
        &self,
        poll_id: Uuid,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            if let Some(poll) = inner
                .polls
                .iter_mut()
                .find(|poll| poll.id == poll_id && poll.status == PollStatus::Active)
            {
                if !poll.eligible_student_keys.contains(&student_key) {
                    poll.eligible_student_keys.push(student_key);
                }
            }
            Ok(())
        })
    }

    fn clear_ended_polls(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            let ended: Vec<Uuid> = inner
                .polls
                .iter()
                .filter(|poll| poll.status == PollStatus::Ended)
                .map(|poll| poll.id)
                .collect();
            inner.votes.retain(|vote| !ended.contains(&vote.poll_id));
            inner.polls.retain(|poll| poll.status != PollStatus::Ended);
            Ok(ended.len() as u64)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            let duplicate = inner
                .votes
                .iter()
                .any(|v| v.poll_id == vote.poll_id && v.student_key == vote.student_key);
            if duplicate {
                return Err(StorageError::Duplicate {
                    constraint: VOTE_CONSTRAINT,
                });
            }
            inner.votes.push(vote);
            Ok(())
        })
    }

    fn count_votes_by_option(
        &self,
        poll_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, u64>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            let mut counts = HashMap::new();
            for vote in inner.votes.iter().filter(|vote| vote.poll_id == poll_id) {
                *counts.entry(vote.option_id.clone()).or_insert(0u64) += 1;
            }
            Ok(counts)
        })
    }

    fn distinct_voters(&self, poll_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            let mut voters: Vec<String> = inner
                .votes
                .iter()
                .filter(|vote| vote.poll_id == poll_id)
                .map(|vote| vote.student_key.clone())
                .collect();
            voters.sort();
            voters.dedup();
            Ok(voters)
        })
    }

    fn upsert_student(
        &self,
        student_key: String,
        name: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<StudentEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            let new_name = name.clone();
            let student = inner
                .students
                .entry(student_key.clone())
                .and_modify(|student| {
                    student.name = new_name;
                    student.last_seen_at = seen_at;
                })
                .or_insert_with(|| StudentEntity {
                    student_key,
                    name,
                    status: StudentStatus::Active,
                    kicked_at: None,
                    last_seen_at: seen_at,
                });
            Ok(student.clone())
        })
    }

    fn kick_student(
        &self,
        student_key: String,
        kicked_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            if let Some(student) = inner.students.get_mut(&student_key) {
                student.status = StudentStatus::Kicked;
                student.kicked_at.get_or_insert(kicked_at);
            }
            Ok(())
        })
    }

    fn find_student(
        &self,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            Ok(inner.students.get(&student_key).cloned())
        })
    }

    fn list_active_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            let mut students: Vec<StudentEntity> = inner
                .students
                .values()
                .filter(|student| student.status == StudentStatus::Active)
                .cloned()
                .collect();
            students.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
            Ok(students)
        })
    }

    fn insert_chat_message(
        &self,
        message: ChatMessageEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().unwrap().chat.push(message);
            Ok(())
        })
    }

    fn recent_chat_messages(
        &self,
        poll_id: Option<Uuid>,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().unwrap();
            let mut messages: Vec<ChatMessageEntity> = inner
                .chat
                .iter()
                .filter(|message| poll_id.is_none() || message.poll_id == poll_id)
                .cloned()
                .collect();
            messages.sort_by(|a, b| a.ts.cmp(&b.ts));
            let skip = messages.len().saturating_sub(limit as usize);
            Ok(messages.split_off(skip))
        })
    }

    fn delete_chat_messages(
        &self,
        poll_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().unwrap();
            let before = inner.chat.len();
            match poll_id {
                Some(poll_id) => inner.chat.retain(|message| message.poll_id != Some(poll_id)),
                None => inner.chat.clear(),
            }
            Ok((before - inner.chat.len()) as u64)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Fresh shared state with the in-memory store installed.
pub async fn state_with_store() -> (SharedState, MemoryPollStore) {
    let state = AppState::new(AppConfig::default());
    let store = MemoryPollStore::new();
    state.install_poll_store(Arc::new(store.clone())).await;
    (state, store)
}

/// Fresh shared state in degraded mode (no store installed).
pub fn degraded_state() -> SharedState {
    AppState::new(AppConfig::default())
}
