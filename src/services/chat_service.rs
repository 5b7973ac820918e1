//! Chat channel logic: validation, rate limiting, persistence with fallback.

use std::time::SystemTime;

use rand::{Rng, distr::Alphanumeric};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::ChatMessageEntity,
    dto::chat::{ChatMessageDto, ChatSendPayload},
    error::ServiceError,
    services::student_service,
    state::SharedState,
};

const CHAT_ID_LENGTH: usize = 12;
const MAX_TEXT_CHARS: usize = 300;

/// Accept a chat message from a connection.
///
/// Validation order matters: length, then rate limit (rejected sends are
/// never persisted and do not extend the window), then the kicked check.
/// The kicked check is skipped when the store is down so degraded-store chat
/// keeps working. Poll-scoped messages are persisted when possible; anything
/// else lands in the bounded in-memory ring.
pub async fn send_message(
    state: &SharedState,
    conn_id: Uuid,
    payload: ChatSendPayload,
) -> Result<ChatMessageEntity, ServiceError> {
    let text = payload.text.trim().to_string();
    if text.is_empty() || text.chars().count() > MAX_TEXT_CHARS {
        return Err(ServiceError::InvalidInput(
            "Message must be between 1 and 300 characters.".into(),
        ));
    }

    let admitted = {
        let mut window = state.chat_windows().entry(conn_id).or_default();
        window.try_acquire(
            Instant::now(),
            state.config().chat_rate_window(),
            state.config().chat_rate_max(),
        )
    };
    if !admitted {
        return Err(ServiceError::RateLimited);
    }

    if state.poll_store().await.is_some()
        && student_service::is_kicked(state, &payload.student_key).await?
    {
        return Err(ServiceError::Kicked);
    }

    let message = ChatMessageEntity {
        id: new_chat_id(),
        poll_id: payload.poll_id,
        from_key: payload.student_key,
        from_name: payload.name,
        text,
        ts: SystemTime::now(),
    };

    let persisted = match (payload.poll_id, state.poll_store().await) {
        (Some(_), Some(store)) => match store.insert_chat_message(message.clone()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to persist chat message; buffering instead");
                false
            }
        },
        _ => false,
    };

    if !persisted {
        buffer_message(state, message.clone()).await;
    }

    Ok(message)
}

/// Clear chat messages, scoped to one poll or everything.
///
/// Idempotent. The ring is always cleared; the store is cleared when
/// reachable, so this succeeds in degraded mode too.
pub async fn clear_messages(
    state: &SharedState,
    poll_id: Option<Uuid>,
) -> Result<u64, ServiceError> {
    let deleted = match state.poll_store().await {
        Some(store) => store.delete_chat_messages(poll_id).await?,
        None => 0,
    };

    {
        let mut buffer = state.chat_buffer().lock().await;
        match poll_id {
            Some(poll_id) => buffer.retain(|message| message.poll_id != Some(poll_id)),
            None => buffer.clear(),
        }
    }

    info!(deleted, "chat messages cleared");
    Ok(deleted)
}

/// Recent messages in chronological order.
///
/// Scoped requests hit the store when it is reachable. Unscoped messages are
/// never persisted, so an unscoped request always reads the ring, as does any
/// request while the store is down.
pub async fn recent_messages(
    state: &SharedState,
    poll_id: Option<Uuid>,
) -> Result<Vec<ChatMessageDto>, ServiceError> {
    let limit = state.config().chat_history_limit();

    if poll_id.is_some() {
        if let Some(store) = state.poll_store().await {
            let messages = store.recent_chat_messages(poll_id, limit).await?;
            return Ok(messages.into_iter().map(Into::into).collect());
        }
    }

    let buffer = state.chat_buffer().lock().await;
    let matching: Vec<ChatMessageEntity> = buffer
        .iter()
        .filter(|message| poll_id.is_none() || message.poll_id == poll_id)
        .cloned()
        .collect();
    let skip = matching.len().saturating_sub(limit as usize);
    Ok(matching.into_iter().skip(skip).map(Into::into).collect())
}

/// Drop the rate-limit window of a closed connection.
pub fn clear_rate_limit(state: &SharedState, conn_id: Uuid) {
    state.chat_windows().remove(&conn_id);
}

/// Append to the bounded in-memory ring, dropping the oldest entry when full.
async fn buffer_message(state: &SharedState, message: ChatMessageEntity) {
    let mut buffer = state.chat_buffer().lock().await;
    if buffer.len() >= state.config().chat_buffer_capacity() {
        buffer.pop_front();
    }
    buffer.push_back(message);
}

fn new_chat_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CHAT_ID_LENGTH)
        .map(char::from)
        .collect()
}
