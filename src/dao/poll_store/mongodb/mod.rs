//! MongoDB implementation of the [`PollStore`](super::PollStore) contract.

mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoPollStore;
