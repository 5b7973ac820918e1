use axum::Router;

use crate::state::SharedState;

pub mod chat;
pub mod docs;
pub mod health;
pub mod poll;
pub mod student;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .nest("/api/poll", poll::router())
        .nest("/api/students", student::router())
        .nest("/api/chat", chat::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
