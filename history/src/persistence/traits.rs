//! Async repository trait for the game record table.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send` and stores can be driven from
//! `tokio::spawn`.

use std::future::Future;

use super::PersistenceError;
use crate::record::StoredGameRecord;

/// Repository for the snapshots of one game, keyed by dense ids.
///
/// Every method is atomic with respect to storage. `replace_all` must leave
/// the previous contents untouched when any write fails.
pub trait GameRecordRepository: Send + Sync {
    /// All records, ordered by id.
    fn load_records(
        &self,
    ) -> impl Future<Output = Result<Vec<StoredGameRecord>, PersistenceError>> + Send;
    /// Insert a new record. Fails with `DuplicateRecord` if the id is taken.
    fn insert_record(
        &self,
        record: &StoredGameRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    /// Overwrite an existing record. Returns whether a row was updated.
    fn update_record(
        &self,
        record: &StoredGameRecord,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    /// Delete every record with an id of at least `id`. Returns the number removed.
    fn delete_from(&self, id: u32) -> impl Future<Output = Result<u64, PersistenceError>> + Send;
    /// Swap the whole table for `records` in one transaction.
    fn replace_all(
        &self,
        records: &[StoredGameRecord],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
