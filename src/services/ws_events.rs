//! Fan-out helpers pushing [`ServerMessage`] frames to connected clients.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        chat::{ChatClearedPayload, ChatMessageDto},
        poll::PollUpdatePayload,
        student::RosterPayload,
        ws::ServerMessage,
    },
    services::{poll_service, student_service},
    state::SharedState,
};

/// Serialize a message and push it onto one writer channel.
///
/// Serialization failures are logged and swallowed; they indicate a bug, not
/// a recoverable condition. Returns `false` when the writer channel is closed.
pub fn send_to_tx(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) -> bool {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound message");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

/// Send a message to one connection by id, if it is still registered.
pub fn send_to_client(state: &SharedState, conn_id: Uuid, message: &ServerMessage) {
    if let Some(conn) = state.clients().get(&conn_id) {
        send_to_tx(&conn.tx, message);
    }
}

/// Send a message to every connected client.
///
/// The payload is serialized once and cloned per connection.
pub fn broadcast(state: &SharedState, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast message");
            return;
        }
    };

    for conn in state.clients().iter() {
        let _ = conn.tx.send(Message::Text(payload.clone().into()));
    }
}

/// Re-fetch the canonical poll state and broadcast it to everyone.
///
/// Broadcasting from a stale local snapshot is forbidden; this always goes
/// back to the coordinator. Failures (degraded mode) are logged only.
pub async fn broadcast_poll_state(state: &SharedState) {
    match poll_service::active_poll_state(state).await {
        Ok(payload) => broadcast(state, &ServerMessage::PollActive(payload)),
        Err(err) => warn!(error = %err, "skipping poll state broadcast"),
    }
}

/// Broadcast incremental results after a vote.
pub fn broadcast_results(state: &SharedState, payload: PollUpdatePayload) {
    broadcast(state, &ServerMessage::PollUpdate(payload));
}

/// Re-fetch the roster and broadcast it to everyone.
pub async fn broadcast_roster(state: &SharedState) {
    match student_service::list_active_students(state).await {
        Ok(participants) => broadcast(
            state,
            &ServerMessage::ParticipantsUpdate(RosterPayload { participants }),
        ),
        Err(err) => warn!(error = %err, "skipping roster broadcast"),
    }
}

/// Broadcast a newly accepted chat message.
pub fn broadcast_chat_new(state: &SharedState, message: ChatMessageDto) {
    broadcast(state, &ServerMessage::ChatNew(message));
}

/// Broadcast that chat messages were cleared.
pub fn broadcast_chat_cleared(state: &SharedState, poll_id: Option<Uuid>) {
    broadcast(state, &ServerMessage::ChatCleared(ChatClearedPayload { poll_id }));
}
