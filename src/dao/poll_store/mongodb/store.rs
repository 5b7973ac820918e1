use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoChatMessageDocument, MongoPollDocument, MongoStudentDocument, MongoVoteDocument,
        bson_uuid, doc_id,
    },
};
use crate::dao::{
    models::{ChatMessageEntity, PollEntity, StudentEntity, VoteEntity},
    poll_store::PollStore,
    storage::StorageResult,
};

const POLL_COLLECTION: &str = "polls";
const VOTE_COLLECTION: &str = "votes";
const STUDENT_COLLECTION: &str = "students";
const CHAT_COLLECTION: &str = "chat_messages";

/// Name of the unique compound index that enforces one vote per student per poll.
const VOTE_UNIQUE_INDEX: &str = "poll_student_unique_idx";

/// MongoDB-backed [`PollStore`].
#[derive(Clone)]
pub struct MongoPollStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoPollStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // The unique (poll_id, student_key) index is the sole double-vote
        // guard; everything else is a read-path optimization.
        let votes = database.collection::<MongoVoteDocument>(VOTE_COLLECTION);
        let vote_index = IndexModel::builder()
            .keys(doc! {"poll_id": 1, "student_key": 1})
            .options(
                IndexOptions::builder()
                    .name(Some(VOTE_UNIQUE_INDEX.to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        votes
            .create_index(vote_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION,
                index: "poll_id,student_key",
                source,
            })?;

        let polls = database.collection::<MongoPollDocument>(POLL_COLLECTION);
        let status_index = IndexModel::builder()
            .keys(doc! {"status": 1, "started_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("poll_status_idx".to_owned()))
                    .build(),
            )
            .build();
        polls
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: POLL_COLLECTION,
                index: "status,started_at",
                source,
            })?;

        let chat = database.collection::<MongoChatMessageDocument>(CHAT_COLLECTION);
        let chat_index = IndexModel::builder()
            .keys(doc! {"poll_id": 1, "ts": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("chat_poll_ts_idx".to_owned()))
                    .build(),
            )
            .build();
        chat.create_index(chat_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: CHAT_COLLECTION,
                index: "poll_id,ts",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn polls(&self) -> Collection<MongoPollDocument> {
        self.database().await.collection(POLL_COLLECTION)
    }

    async fn votes(&self) -> Collection<MongoVoteDocument> {
        self.database().await.collection(VOTE_COLLECTION)
    }

    async fn students(&self) -> Collection<MongoStudentDocument> {
        self.database().await.collection(STUDENT_COLLECTION)
    }

    async fn chat(&self) -> Collection<MongoChatMessageDocument> {
        self.database().await.collection(CHAT_COLLECTION)
    }

    async fn insert_poll(&self, poll: PollEntity) -> MongoResult<()> {
        let document: MongoPollDocument = poll.into();
        self.polls()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: POLL_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_poll(&self, id: Uuid) -> MongoResult<Option<PollEntity>> {
        let document = self
            .polls()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn find_active_poll(&self) -> MongoResult<Option<PollEntity>> {
        let document = self
            .polls()
            .await
            .find_one(doc! {"status": "active"})
            .sort(doc! {"started_at": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn latest_ended_poll(&self) -> MongoResult<Option<PollEntity>> {
        let document = self
            .polls()
            .await
            .find_one(doc! {"status": "ended"})
            .sort(doc! {"ended_at": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_ended_polls(&self, limit: u32) -> MongoResult<Vec<PollEntity>> {
        let documents: Vec<MongoPollDocument> = self
            .polls()
            .await
            .find(doc! {"status": "ended"})
            .sort(doc! {"started_at": -1})
            .limit(i64::from(limit))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn end_poll(&self, id: Uuid, ended_at: SystemTime) -> MongoResult<bool> {
        let result = self
            .polls()
            .await
            .update_one(
                doc! {"_id": bson_uuid(id), "status": "active"},
                doc! {"$set": {
                    "status": "ended",
                    "ended_at": DateTime::from_system_time(ended_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: POLL_COLLECTION,
                source,
            })?;

        Ok(result.modified_count > 0)
    }

    async fn add_eligible_student(&self, poll_id: Uuid, student_key: String) -> MongoResult<()> {
        self.polls()
            .await
            .update_one(
                doc! {"_id": bson_uuid(poll_id), "status": "active"},
                doc! {"$addToSet": {"eligible_student_keys": student_key}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: POLL_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn clear_ended_polls(&self) -> MongoResult<u64> {
        let ended: Vec<MongoPollDocument> = self
            .polls()
            .await
            .find(doc! {"status": "ended"})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: POLL_COLLECTION,
                source,
            })?;

        let ids: Vec<_> = ended
            .into_iter()
            .map(|document| bson_uuid(PollEntity::from(document).id))
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        self.votes()
            .await
            .delete_many(doc! {"poll_id": {"$in": ids.clone()}})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: VOTE_COLLECTION,
                source,
            })?;

        let result = self
            .polls()
            .await
            .delete_many(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: POLL_COLLECTION,
                source,
            })?;

        Ok(result.deleted_count)
    }

    async fn insert_vote(&self, vote: VoteEntity) -> MongoResult<()> {
        let document: MongoVoteDocument = vote.into();
        self.votes()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateKey {
                        constraint: VOTE_UNIQUE_INDEX,
                    }
                } else {
                    MongoDaoError::Write {
                        collection: VOTE_COLLECTION,
                        source,
                    }
                }
            })?;
        Ok(())
    }

    async fn count_votes_by_option(&self, poll_id: Uuid) -> MongoResult<HashMap<String, u64>> {
        let pipeline = vec![
            doc! {"$match": {"poll_id": bson_uuid(poll_id)}},
            doc! {"$group": {"_id": "$option_id", "count": {"$sum": 1}}},
        ];

        let groups: Vec<Document> = self
            .votes()
            .await
            .aggregate(pipeline)
            .await
            .map_err(|source| MongoDaoError::Aggregate {
                collection: VOTE_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Aggregate {
                collection: VOTE_COLLECTION,
                source,
            })?;

        let mut counts = HashMap::with_capacity(groups.len());
        for group in groups {
            let Ok(option_id) = group.get_str("_id") else {
                continue;
            };
            let count = group
                .get_i64("count")
                .ok()
                .or_else(|| group.get_i32("count").ok().map(i64::from))
                .unwrap_or(0);
            counts.insert(option_id.to_owned(), count.max(0) as u64);
        }

        Ok(counts)
    }

    async fn distinct_voters(&self, poll_id: Uuid) -> MongoResult<Vec<String>> {
        let values = self
            .votes()
            .await
            .distinct("student_key", doc! {"poll_id": bson_uuid(poll_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: VOTE_COLLECTION,
                source,
            })?;

        Ok(values
            .into_iter()
            .filter_map(|value| value.as_str().map(str::to_owned))
            .collect())
    }

    async fn upsert_student(
        &self,
        student_key: String,
        name: String,
        seen_at: SystemTime,
    ) -> MongoResult<StudentEntity> {
        let filter = doc! {"_id": &student_key};
        let update = doc! {
            "$set": {
                "name": &name,
                "last_seen_at": DateTime::from_system_time(seen_at),
            },
            "$setOnInsert": {
                "status": "active",
                "kicked_at": null,
            },
        };

        // A concurrent upsert on the same key can surface a transient
        // duplicate-key error from the server; one retry resolves it.
        for attempt in 0..2 {
            let result = self
                .students()
                .await
                .find_one_and_update(filter.clone(), update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;

            match result {
                Ok(Some(document)) => return Ok(document.into()),
                Ok(None) => {
                    return Err(MongoDaoError::MissingUpsertResult {
                        collection: STUDENT_COLLECTION,
                    });
                }
                Err(source) if is_duplicate_key(&source) && attempt == 0 => continue,
                Err(source) => {
                    return Err(MongoDaoError::Write {
                        collection: STUDENT_COLLECTION,
                        source,
                    });
                }
            }
        }

        Err(MongoDaoError::MissingUpsertResult {
            collection: STUDENT_COLLECTION,
        })
    }

    async fn kick_student(&self, student_key: String, kicked_at: SystemTime) -> MongoResult<()> {
        self.students()
            .await
            .update_one(
                doc! {"_id": student_key},
                doc! {"$set": {
                    "status": "kicked",
                    "kicked_at": DateTime::from_system_time(kicked_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: STUDENT_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_student(&self, student_key: String) -> MongoResult<Option<StudentEntity>> {
        let document = self
            .students()
            .await
            .find_one(doc! {"_id": student_key})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STUDENT_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_active_students(&self) -> MongoResult<Vec<StudentEntity>> {
        let documents: Vec<MongoStudentDocument> = self
            .students()
            .await
            .find(doc! {"status": "active"})
            .sort(doc! {"last_seen_at": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STUDENT_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STUDENT_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_chat_message(&self, message: ChatMessageEntity) -> MongoResult<()> {
        let document: MongoChatMessageDocument = message.into();
        self.chat()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: CHAT_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn recent_chat_messages(
        &self,
        poll_id: Option<Uuid>,
        limit: u32,
    ) -> MongoResult<Vec<ChatMessageEntity>> {
        let filter = match poll_id {
            Some(id) => doc! {"poll_id": bson_uuid(id)},
            None => doc! {},
        };

        let mut documents: Vec<MongoChatMessageDocument> = self
            .chat()
            .await
            .find(filter)
            .sort(doc! {"ts": -1})
            .limit(i64::from(limit))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: CHAT_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: CHAT_COLLECTION,
                source,
            })?;

        // Queried newest-first for the limit; callers want chronological order.
        documents.reverse();
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_chat_messages(&self, poll_id: Option<Uuid>) -> MongoResult<u64> {
        let filter = match poll_id {
            Some(id) => doc! {"poll_id": bson_uuid(id)},
            None => doc! {},
        };

        let result = self
            .chat()
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: CHAT_COLLECTION,
                source,
            })?;

        Ok(result.deleted_count)
    }
}

impl PollStore for MongoPollStore {
    fn insert_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_poll(poll).await.map_err(Into::into) })
    }

    fn find_poll(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_poll(id).await.map_err(Into::into) })
    }

    fn find_active_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_active_poll().await.map_err(Into::into) })
    }

    fn latest_ended_poll(&self) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_ended_poll().await.map_err(Into::into) })
    }

    fn list_ended_polls(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_ended_polls(limit).await.map_err(Into::into) })
    }

    fn end_poll(
        &self,
        id: Uuid,
        ended_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.end_poll(id, ended_at).await.map_err(Into::into) })
    }

    fn add_eligible_student(
        &self,
        poll_id: Uuid,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_eligible_student(poll_id, student_key)
                .await
                .map_err(Into::into)
        })
    }

    fn clear_ended_polls(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.clear_ended_polls().await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await.map_err(Into::into) })
    }

    fn count_votes_by_option(
        &self,
        poll_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, u64>>> {
        let store = self.clone();
        Box::pin(async move { store.count_votes_by_option(poll_id).await.map_err(Into::into) })
    }

    fn distinct_voters(&self, poll_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.distinct_voters(poll_id).await.map_err(Into::into) })
    }

    fn upsert_student(
        &self,
        student_key: String,
        name: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<StudentEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_student(student_key, name, seen_at)
                .await
                .map_err(Into::into)
        })
    }

    fn kick_student(
        &self,
        student_key: String,
        kicked_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .kick_student(student_key, kicked_at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_student(
        &self,
        student_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_student(student_key).await.map_err(Into::into) })
    }

    fn list_active_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_active_students().await.map_err(Into::into) })
    }

    fn insert_chat_message(
        &self,
        message: ChatMessageEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_chat_message(message).await.map_err(Into::into) })
    }

    fn recent_chat_messages(
        &self,
        poll_id: Option<Uuid>,
        limit: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatMessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .recent_chat_messages(poll_id, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_chat_messages(
        &self,
        poll_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_chat_messages(poll_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
