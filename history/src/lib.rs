//! Durable move history for a chess game: a SQLite-backed record store,
//! PGN import and JSON archives.

pub mod archive;
pub mod config;
pub mod importer;
pub mod notify;
pub mod persistence;
pub mod record;
pub mod store;

pub use archive::{restore_archive, Archive, ArchiveError};
pub use importer::{import_pgn, ImportError};
pub use notify::{HistoryChange, HistoryEvent, ReloadNotifier};
pub use record::{GameRecord, StoredGameRecord};
pub use store::{GameRecordStore, StoreError};
