/// Chat channel logic: validation, rate limiting, persistence with fallback.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Poll lifecycle coordination: create, vote, tally, end.
pub mod poll_service;
/// Storage supervision with reconnection and degraded mode.
pub mod storage_supervisor;
/// Participant roster and connection tracking.
pub mod student_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// WebSocket broadcast message generation.
pub mod ws_events;
