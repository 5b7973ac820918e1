use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures specific to the MongoDB backend, wrapped into [`StorageError`] at
/// the trait boundary.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// The driver client could not be constructed from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The initial connectivity ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// A periodic health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// An index could not be created at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// An insert or update failed.
    #[error("write to collection `{collection}` failed")]
    Write {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// A query failed.
    #[error("read from collection `{collection}` failed")]
    Read {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// A delete failed.
    #[error("delete on collection `{collection}` failed")]
    Delete {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// An aggregation pipeline failed.
    #[error("aggregation on collection `{collection}` failed")]
    Aggregate {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// An upsert with `ReturnDocument::After` came back empty.
    #[error("collection `{collection}` returned no document after upsert")]
    MissingUpsertResult { collection: &'static str },
    /// A unique index rejected the write.
    #[error("unique constraint `{constraint}` rejected the write")]
    DuplicateKey { constraint: &'static str },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateKey { constraint } => StorageError::Duplicate { constraint },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

/// Whether a driver error is a unique-index violation (server code 11000).
pub fn is_duplicate_key(err: &MongoError) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}
