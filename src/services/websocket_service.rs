//! WebSocket connection lifecycle and message dispatch.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{AckMessage, ClientMessage, ServerMessage},
    error::ServiceError,
    services::{chat_service, poll_service, student_service, ws_events},
    state::{ClientConnection, SharedState},
};

const KICK_REASON: &str = "You have been removed by the teacher.";

/// Handle the full lifecycle for an individual WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let conn_id = Uuid::new_v4();
    state.clients().insert(
        conn_id,
        ClientConnection {
            id: conn_id,
            student_key: None,
            tx: outbound_tx.clone(),
        },
    );
    info!(conn_id = %conn_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let inbound = match ClientMessage::from_json_str(&text) {
                    Ok(inbound) => inbound,
                    Err(err) => {
                        warn!(conn_id = %conn_id, error = %err, "failed to parse or validate client message");
                        ws_events::send_to_tx(
                            &outbound_tx,
                            &ServerMessage::ErrorMessage {
                                message: "Invalid message.".into(),
                            },
                        );
                        continue;
                    }
                };
                dispatch(&state, conn_id, &outbound_tx, inbound).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(conn_id = %conn_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(conn_id = %conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    let disconnected_student = student_service::set_disconnected(&state, conn_id);
    state.clients().remove(&conn_id);
    chat_service::clear_rate_limit(&state, conn_id);
    info!(conn_id = %conn_id, "client disconnected");

    if disconnected_student.is_some() {
        ws_events::broadcast_roster(&state).await;
    }

    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed message to its handler.
async fn dispatch(
    state: &SharedState,
    conn_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    inbound: ClientMessage,
) {
    match inbound {
        ClientMessage::StudentJoin(payload) => {
            handle_student_join(state, conn_id, tx, payload).await;
        }
        ClientMessage::TeacherJoin {} => {
            send_snapshot(state, tx).await;
            send_roster(state, tx).await;
        }
        ClientMessage::PollCreate(payload) => {
            let request_id = payload.request_id;
            match poll_service::create_poll(state, payload).await {
                Ok(snapshot) => {
                    ws_events::broadcast(state, &ServerMessage::PollActive(snapshot.clone()));
                    send_ack(tx, AckMessage::confirmed_with_poll(request_id, snapshot));
                }
                Err(err) => reject(tx, request_id, &err),
            }
        }
        ClientMessage::PollVote(payload) => {
            let request_id = payload.request_id;
            match poll_service::vote(state, payload).await {
                Ok(outcome) => {
                    info!(conn_id = %conn_id, poll_id = %outcome.poll_id, early_ended = outcome.early_ended, "vote counted");
                    send_ack(tx, AckMessage::confirmed(request_id));
                }
                Err(err) => {
                    if matches!(err, ServiceError::Kicked) {
                        notify_kicked(state, conn_id);
                    }
                    reject(tx, request_id, &err);
                }
            }
        }
        ClientMessage::TeacherKick(payload) => {
            match student_service::kick_student(state, &payload.student_key).await {
                Ok(kicked_conn) => {
                    if let Some(kicked_conn) = kicked_conn {
                        notify_kicked(state, kicked_conn);
                    }
                    ws_events::broadcast_roster(state).await;
                }
                Err(err) => send_error(tx, &err),
            }
        }
        ClientMessage::ChatSend(payload) => {
            let request_id = payload.request_id;
            match chat_service::send_message(state, conn_id, payload).await {
                Ok(message) => {
                    ws_events::broadcast_chat_new(state, message.into());
                    send_ack(tx, AckMessage::confirmed(request_id));
                }
                Err(err) => {
                    if matches!(err, ServiceError::Kicked) {
                        notify_kicked(state, conn_id);
                    }
                    reject(tx, request_id, &err);
                }
            }
        }
        ClientMessage::ChatClear(payload) => {
            let request_id = payload.request_id;
            match chat_service::clear_messages(state, payload.poll_id).await {
                Ok(_) => {
                    ws_events::broadcast_chat_cleared(state, payload.poll_id);
                    send_ack(tx, AckMessage::confirmed(request_id));
                }
                Err(err) => reject(tx, request_id, &err),
            }
        }
        ClientMessage::Unknown => {
            ws_events::send_to_tx(
                tx,
                &ServerMessage::ErrorMessage {
                    message: "Unknown message type.".into(),
                },
            );
        }
    }
}

/// Student join: upsert, bind the connection, refresh everyone, then bring
/// the newcomer up to date with the poll state and chat backlog.
async fn handle_student_join(
    state: &SharedState,
    conn_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    payload: crate::dto::student::StudentJoinPayload,
) {
    match student_service::join(state, &payload).await {
        Ok(student) => {
            student_service::set_connected(state, &student.student_key, conn_id);
            poll_service::note_student_joined(state, &student.student_key).await;
            info!(conn_id = %conn_id, student_key = %student.student_key, "student joined");

            ws_events::broadcast_roster(state).await;
            send_snapshot(state, tx).await;
        }
        Err(ServiceError::Kicked) => {
            notify_kicked(state, conn_id);
        }
        Err(err) => send_error(tx, &err),
    }
}

/// Push the canonical poll state and matching chat backlog to one connection.
async fn send_snapshot(state: &SharedState, tx: &mpsc::UnboundedSender<Message>) {
    match poll_service::active_poll_state(state).await {
        Ok(snapshot) => {
            let poll_id = snapshot.active_poll.as_ref().map(|poll| poll.poll_id);
            ws_events::send_to_tx(tx, &ServerMessage::PollActive(snapshot));

            match chat_service::recent_messages(state, poll_id).await {
                Ok(messages) => {
                    ws_events::send_to_tx(
                        tx,
                        &ServerMessage::ChatHistory(crate::dto::chat::ChatHistoryPayload {
                            messages,
                        }),
                    );
                }
                Err(err) => warn!(error = %err, "failed to load chat history for join"),
            }
        }
        Err(err) => send_error(tx, &err),
    }
}

/// Push the current roster to one connection.
async fn send_roster(state: &SharedState, tx: &mpsc::UnboundedSender<Message>) {
    match student_service::list_active_students(state).await {
        Ok(participants) => {
            ws_events::send_to_tx(
                tx,
                &ServerMessage::ParticipantsUpdate(crate::dto::student::RosterPayload {
                    participants,
                }),
            );
        }
        Err(err) => send_error(tx, &err),
    }
}

/// Send the kick notice, then force the connection closed after a short
/// grace delay so the notice has a chance to flush.
fn notify_kicked(state: &SharedState, conn_id: Uuid) {
    ws_events::send_to_client(
        state,
        conn_id,
        &ServerMessage::StudentKicked {
            reason: KICK_REASON.into(),
        },
    );

    let task_state = state.clone();
    let grace = state.config().kick_grace();
    tokio::spawn(async move {
        sleep(grace).await;
        if let Some(conn) = task_state.clients().get(&conn_id) {
            let _ = conn.tx.send(Message::Close(None));
        }
    });
}

fn send_ack(tx: &mpsc::UnboundedSender<Message>, ack: AckMessage) {
    ws_events::send_to_tx(tx, &ServerMessage::Ack(ack));
}

/// Rejection path for ack-bearing requests: the ack carries the reason and
/// the originating connection also gets an error notice.
fn reject(tx: &mpsc::UnboundedSender<Message>, request_id: Option<Uuid>, err: &ServiceError) {
    warn!(error = %err, "request rejected");
    send_ack(tx, AckMessage::rejected(request_id, err.user_message()));
    send_error(tx, err);
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, err: &ServiceError) {
    ws_events::send_to_tx(
        tx,
        &ServerMessage::ErrorMessage {
            message: err.user_message(),
        },
    );
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
