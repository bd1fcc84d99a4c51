pub mod sqlite;
pub mod traits;

pub use sqlite::{Database, SqliteGameRecordRepository};
pub use traits::GameRecordRepository;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Record {0} already exists")]
    DuplicateRecord(u32),
}
