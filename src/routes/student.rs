use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::student::ParticipantInfo, error::AppError, services::student_service, state::SharedState,
};

/// Routes exposing the participant roster.
pub fn router() -> Router<SharedState> {
    Router::new().route("/participants", get(participants))
}

/// Non-kicked students, most recently seen first.
#[utoipa::path(
    get,
    path = "/api/students/participants",
    tag = "students",
    responses(
        (status = 200, description = "Current roster", body = [ParticipantInfo]),
        (status = 503, description = "Storage unavailable (degraded mode)")
    )
)]
pub async fn participants(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ParticipantInfo>>, AppError> {
    let roster = student_service::list_active_students(&state).await?;
    Ok(Json(roster))
}
