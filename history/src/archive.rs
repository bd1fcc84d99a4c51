//! Whole-history export to and restore from a JSON archive.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::notify::HistoryChange;
use crate::persistence::GameRecordRepository;
use crate::record::{GameRecord, StoredGameRecord};
use crate::store::{check_dense_ids, GameRecordStore, StoreError};

pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported archive version {0}")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Serialized form of a complete history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub version: u32,
    pub records: Vec<StoredGameRecord>,
}

impl Archive {
    /// Snapshot every record of a loaded store.
    pub fn from_store<R: GameRecordRepository>(store: &GameRecordStore<R>) -> Self {
        let records = store
            .record_ids()
            .into_iter()
            .filter_map(|id| store.get(id))
            .map(|r| r.to_stored())
            .collect();
        Self {
            version: ARCHIVE_VERSION,
            records,
        }
    }

    /// Check the version, id density and every snapshot, returning the
    /// decoded records.
    pub fn validate(&self) -> Result<Vec<GameRecord>, ArchiveError> {
        if self.version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(self.version));
        }
        check_dense_ids(self.records.iter().map(|r| &r.id))?;
        self.records
            .iter()
            .cloned()
            .map(|stored| {
                let id = stored.id;
                GameRecord::try_from(stored)
                    .map_err(|source| ArchiveError::from(StoreError::CorruptRecord { id, source }))
            })
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<(), ArchiveError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ArchiveError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Replace the store's history with the archive's. Nothing changes unless
/// the whole archive is valid.
pub async fn restore_archive<R: GameRecordRepository>(
    store: &mut GameRecordStore<R>,
    archive: &Archive,
) -> Result<usize, ArchiveError> {
    let records = archive.validate()?;
    let record_count = records.len();
    store
        .replace_all(&records, HistoryChange::Restored { record_count })
        .await?;
    tracing::info!(records = record_count, "Restored history from archive");
    Ok(record_count)
}
