use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::poll::{ClearHistoryResponse, PollHistoryItem, PollStatePayload},
    error::AppError,
    services::poll_service,
    state::SharedState,
};

/// Routes serving poll state and history for initial load and recovery.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/active", get(active_poll))
        .route("/history", get(poll_history).delete(clear_poll_history))
}

/// The canonical poll-state payload, same shape as the `poll:active` push.
#[utoipa::path(
    get,
    path = "/api/poll/active",
    tag = "poll",
    responses(
        (status = 200, description = "Current poll state", body = PollStatePayload),
        (status = 503, description = "Storage unavailable (degraded mode)")
    )
)]
pub async fn active_poll(
    State(state): State<SharedState>,
) -> Result<Json<PollStatePayload>, AppError> {
    let payload = poll_service::active_poll_state(&state).await?;
    Ok(Json(payload))
}

/// Ended polls with their final results, most recent first.
#[utoipa::path(
    get,
    path = "/api/poll/history",
    tag = "poll",
    responses(
        (status = 200, description = "Ended polls with results", body = [PollHistoryItem]),
        (status = 503, description = "Storage unavailable (degraded mode)")
    )
)]
pub async fn poll_history(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PollHistoryItem>>, AppError> {
    let items = poll_service::history(&state).await?;
    Ok(Json(items))
}

/// Delete every ended poll and its votes.
#[utoipa::path(
    delete,
    path = "/api/poll/history",
    tag = "poll",
    responses(
        (status = 200, description = "History cleared", body = ClearHistoryResponse),
        (status = 503, description = "Storage unavailable (degraded mode)")
    )
)]
pub async fn clear_poll_history(
    State(state): State<SharedState>,
) -> Result<Json<ClearHistoryResponse>, AppError> {
    let count = poll_service::clear_history(&state).await?;
    Ok(Json(ClearHistoryResponse {
        message: "Poll history cleared.".into(),
        count,
    }))
}
