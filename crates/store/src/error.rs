//! Storage errors.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    /// A row that cannot be decoded into a queue item.
    #[error("corrupt row {id}: {message}")]
    Corrupt { id: i64, message: String },
}

impl StoreError {
    pub fn corrupt(id: i64, msg: impl Into<String>) -> Self {
        Self::Corrupt {
            id,
            message: msg.into(),
        }
    }
}

impl From<StoreError> for inbox_core::Error {
    fn from(err: StoreError) -> Self {
        inbox_core::Error::storage(err.to_string())
    }
}
