//! Persistence layer: entities, the store contract, and the MongoDB backend.

/// Database model definitions.
pub mod models;
/// Poll storage and retrieval operations.
pub mod poll_store;
/// Storage abstraction layer for database operations.
pub mod storage;
