use consensus_core::errors::ConsensusError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    #[error("Database is closed")]
    DatabaseClosed,
}

pub type DbResult<T> = Result<T, DbError>;

impl From<bincode::Error> for DbError {
    fn from(err: bincode::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Data the engine relies on being present is an invariant; every other
/// storage failure is an I/O problem. Both are fatal to consensus.
impl From<DbError> for ConsensusError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(key) => ConsensusError::MissingData(key),
            err => ConsensusError::Storage(err.to_string()),
        }
    }
}
