use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    dto::chat::ChatMessageDto, error::AppError, services::chat_service, state::SharedState,
};

/// Routes serving the chat backlog.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(chat_messages))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
/// Query parameters for the chat backlog endpoint.
pub struct ChatQuery {
    /// Poll whose messages to fetch.
    pub poll_id: Option<Uuid>,
}

/// Recent chat messages for one poll, oldest first.
#[utoipa::path(
    get,
    path = "/api/chat",
    tag = "chat",
    params(ChatQuery),
    responses(
        (status = 200, description = "Recent messages", body = [ChatMessageDto]),
        (status = 400, description = "Missing pollId parameter")
    )
)]
pub async fn chat_messages(
    State(state): State<SharedState>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<Vec<ChatMessageDto>>, AppError> {
    let Some(poll_id) = query.poll_id else {
        return Err(AppError::BadRequest("pollId query parameter is required".into()));
    };

    let messages = chat_service::recent_messages(&state, Some(poll_id)).await?;
    Ok(Json(messages))
}
