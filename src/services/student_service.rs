//! Participant roster and in-process connection tracking.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::StudentEntity,
    dto::student::{ParticipantInfo, StudentJoinPayload},
    error::ServiceError,
    state::SharedState,
};

/// Register or refresh a student on join.
///
/// The upsert is atomic and duplicate-safe; the display name follows the
/// latest join. Fails with [`ServiceError::Kicked`] when the student was
/// removed by the teacher, which is sticky across rejoins.
pub async fn join(
    state: &SharedState,
    payload: &StudentJoinPayload,
) -> Result<StudentEntity, ServiceError> {
    let store = state.require_poll_store().await?;
    let student = store
        .upsert_student(
            payload.student_key.clone(),
            payload.name.clone(),
            SystemTime::now(),
        )
        .await?;

    if student.is_kicked() {
        return Err(ServiceError::Kicked);
    }
    Ok(student)
}

/// Bind a student identity to its WebSocket connection.
///
/// A rejoin from a new connection replaces the previous binding.
pub fn set_connected(state: &SharedState, student_key: &str, conn_id: Uuid) {
    state
        .student_conns()
        .insert(student_key.to_string(), conn_id);
    if let Some(mut conn) = state.clients().get_mut(&conn_id) {
        conn.student_key = Some(student_key.to_string());
    }
}

/// Drop the binding for a closed connection, returning the student key it
/// carried, if the binding still pointed at this connection.
pub fn set_disconnected(state: &SharedState, conn_id: Uuid) -> Option<String> {
    let student_key = state
        .clients()
        .get(&conn_id)
        .and_then(|conn| conn.student_key.clone())?;

    let removed = state
        .student_conns()
        .remove_if(&student_key, |_, bound| *bound == conn_id);
    removed.map(|(key, _)| key)
}

/// One-way removal of a student by the teacher.
///
/// The flip is persisted first; the connection-map entry is removed so the
/// kicked student stops counting as a participant immediately. Returns the
/// connection that must receive the kick notice, if the student is online.
pub async fn kick_student(
    state: &SharedState,
    student_key: &str,
) -> Result<Option<Uuid>, ServiceError> {
    let store = state.require_poll_store().await?;
    store
        .kick_student(student_key.to_string(), SystemTime::now())
        .await?;
    info!(student_key = %student_key, "student kicked");

    let conn_id = state
        .student_conns()
        .remove(student_key)
        .map(|(_, conn_id)| conn_id);
    Ok(conn_id)
}

/// Whether the student has been removed by the teacher.
pub async fn is_kicked(state: &SharedState, student_key: &str) -> Result<bool, ServiceError> {
    let store = state.require_poll_store().await?;
    let student = store.find_student(student_key.to_string()).await?;
    Ok(student.is_some_and(|student| student.is_kicked()))
}

/// Non-kicked students, most recently seen first.
pub async fn list_active_students(
    state: &SharedState,
) -> Result<Vec<ParticipantInfo>, ServiceError> {
    let store = state.require_poll_store().await?;
    let students = store.list_active_students().await?;
    Ok(students.into_iter().map(Into::into).collect())
}

/// Keys of all non-kicked students, the eligibility source for new polls.
pub async fn active_student_keys(state: &SharedState) -> Result<Vec<String>, ServiceError> {
    let store = state.require_poll_store().await?;
    let students = store.list_active_students().await?;
    Ok(students
        .into_iter()
        .map(|student| student.student_key)
        .collect())
}
