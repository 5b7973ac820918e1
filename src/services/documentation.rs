use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Class Pulse Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::poll::active_poll,
        crate::routes::poll::poll_history,
        crate::routes::poll::clear_poll_history,
        crate::routes::student::participants,
        crate::routes::chat::chat_messages,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::poll::PollStatePayload,
            crate::dto::poll::PollHistoryItem,
            crate::dto::poll::ClearHistoryResponse,
            crate::dto::student::ParticipantInfo,
            crate::dto::chat::ChatMessageDto,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "poll", description = "Poll state and history"),
        (name = "students", description = "Participant roster"),
        (name = "chat", description = "Chat backlog"),
        (name = "websocket", description = "Real-time classroom session"),
    )
)]
pub struct ApiDoc;
