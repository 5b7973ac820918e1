use mongodb::bson::{DateTime, Document, Uuid as BsonUuid, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ChatMessageEntity, PollEntity, PollOptionEntity, PollStatus, StudentEntity, StudentStatus,
    VoteEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    question: String,
    options: Vec<PollOptionEntity>,
    duration_sec: u32,
    started_at: DateTime,
    status: PollStatus,
    ended_at: Option<DateTime>,
    #[serde(default)]
    eligible_student_keys: Vec<String>,
}

impl From<PollEntity> for MongoPollDocument {
    fn from(value: PollEntity) -> Self {
        Self {
            id: bson_uuid(value.id),
            question: value.question,
            options: value.options,
            duration_sec: value.duration_sec,
            started_at: DateTime::from_system_time(value.started_at),
            status: value.status,
            ended_at: value.ended_at.map(DateTime::from_system_time),
            eligible_student_keys: value.eligible_student_keys,
        }
    }
}

impl From<MongoPollDocument> for PollEntity {
    fn from(value: MongoPollDocument) -> Self {
        Self {
            id: entity_uuid(value.id),
            question: value.question,
            options: value.options,
            duration_sec: value.duration_sec,
            started_at: value.started_at.to_system_time(),
            status: value.status,
            ended_at: value.ended_at.map(|at| at.to_system_time()),
            eligible_student_keys: value.eligible_student_keys,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    poll_id: BsonUuid,
    student_key: String,
    student_name: String,
    option_id: String,
    voted_at: DateTime,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            poll_id: bson_uuid(value.poll_id),
            student_key: value.student_key,
            student_name: value.student_name,
            option_id: value.option_id,
            voted_at: DateTime::from_system_time(value.voted_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStudentDocument {
    #[serde(rename = "_id")]
    student_key: String,
    name: String,
    status: StudentStatus,
    kicked_at: Option<DateTime>,
    last_seen_at: DateTime,
}

impl From<MongoStudentDocument> for StudentEntity {
    fn from(value: MongoStudentDocument) -> Self {
        Self {
            student_key: value.student_key,
            name: value.name,
            status: value.status,
            kicked_at: value.kicked_at.map(|at| at.to_system_time()),
            last_seen_at: value.last_seen_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChatMessageDocument {
    #[serde(rename = "_id")]
    id: String,
    poll_id: Option<BsonUuid>,
    from_key: String,
    from_name: String,
    text: String,
    ts: DateTime,
}

impl From<ChatMessageEntity> for MongoChatMessageDocument {
    fn from(value: ChatMessageEntity) -> Self {
        Self {
            id: value.id,
            poll_id: value.poll_id.map(bson_uuid),
            from_key: value.from_key,
            from_name: value.from_name,
            text: value.text,
            ts: DateTime::from_system_time(value.ts),
        }
    }
}

impl From<MongoChatMessageDocument> for ChatMessageEntity {
    fn from(value: MongoChatMessageDocument) -> Self {
        Self {
            id: value.id,
            poll_id: value.poll_id.map(entity_uuid),
            from_key: value.from_key,
            from_name: value.from_name,
            text: value.text,
            ts: value.ts.to_system_time(),
        }
    }
}

pub fn bson_uuid(id: Uuid) -> BsonUuid {
    BsonUuid::from_bytes(id.into_bytes())
}

pub fn entity_uuid(id: BsonUuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": bson_uuid(id)}
}
