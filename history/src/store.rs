//! The game record store: the durable move history of one game.
//!
//! The store keeps an id-ordered index of every snapshot plus a working
//! position that tracks the record with the highest id. Mutations write
//! through to the repository first and only touch the index once storage
//! accepted them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chess::pgn::{play_san, SanError};
use chess::{board_square_changes, BoardEngine, CozyBoard, EngineError, Position, PositionError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::notify::{HistoryChange, HistoryEvent, ReloadNotifier};
use crate::persistence::{GameRecordRepository, PersistenceError};
use crate::record::{GameRecord, StoredGameRecord, START_RECORD_ID};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("History has not been loaded")]
    NotLoaded,
    #[error("Record {0} already exists")]
    DuplicateRecord(u32),
    #[error("Stored record {id} is corrupt: {source}")]
    CorruptRecord {
        id: u32,
        #[source]
        source: PositionError,
    },
    #[error("A history needs at least a start record")]
    EmptyHistory,
    #[error("Record ids must run densely from 1, found {found} where {expected} was expected")]
    NonDenseIds { expected: u32, found: u32 },
    #[error(transparent)]
    Persistence(PersistenceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    San(#[from] SanError),
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::DuplicateRecord(id) => Self::DuplicateRecord(id),
            other => Self::Persistence(other),
        }
    }
}

/// Check that `records` is a non-empty run of ids 1, 2, 3, ...
pub fn check_dense_ids<'a>(ids: impl IntoIterator<Item = &'a u32>) -> Result<(), StoreError> {
    let mut count = 0;
    for (expected, &found) in (START_RECORD_ID..).zip(ids) {
        if found != expected {
            return Err(StoreError::NonDenseIds { expected, found });
        }
        count += 1;
    }
    if count == 0 {
        return Err(StoreError::EmptyHistory);
    }
    Ok(())
}

/// Mask of squares whose contents differ between two records. Square 0 is
/// the most significant bit; a missing record gives an empty mask.
pub fn record_square_changes(a: Option<&GameRecord>, b: Option<&GameRecord>) -> u64 {
    board_square_changes(a.map(|r| &r.position), b.map(|r| &r.position))
}

pub struct GameRecordStore<R: GameRecordRepository> {
    repo: Arc<R>,
    records: BTreeMap<u32, GameRecord>,
    current: Position,
    loaded: bool,
    id: Uuid,
    notifier: Option<ReloadNotifier>,
}

impl<R: GameRecordRepository> GameRecordStore<R> {
    /// A store with no siblings to notify.
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            records: BTreeMap::new(),
            current: Position::standard(),
            loaded: false,
            id: Uuid::new_v4(),
            notifier: None,
        }
    }

    /// A store that publishes its mutations on `notifier`.
    pub fn with_notifier(repo: Arc<R>, notifier: ReloadNotifier) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::new(repo)
        }
    }

    /// Identity used as the origin of published events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Subscribe to the notifier this store publishes on, if any.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<HistoryEvent>> {
        self.notifier.as_ref().map(ReloadNotifier::subscribe)
    }

    fn publish(&self, change: HistoryChange) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(self.id, change);
        }
    }

    fn ensure_loaded(&self) -> Result<(), StoreError> {
        if self.loaded {
            Ok(())
        } else {
            Err(StoreError::NotLoaded)
        }
    }

    fn max_id(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    fn decode_all(stored: Vec<StoredGameRecord>) -> Result<BTreeMap<u32, GameRecord>, StoreError> {
        stored
            .into_iter()
            .map(|s| {
                let id = s.id;
                GameRecord::try_from(s)
                    .map(|record| (id, record))
                    .map_err(|source| StoreError::CorruptRecord { id, source })
            })
            .collect()
    }

    /// Rebuild the index from storage, seeding a start record when storage
    /// is empty. The working position becomes the latest record.
    #[tracing::instrument(skip(self), fields(store = %self.id))]
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let mut stored = self.repo.load_records().await?;
        if stored.is_empty() {
            let start = GameRecord::start().to_stored();
            match self.repo.insert_record(&start).await {
                Ok(()) => stored.push(start),
                // A sibling seeded storage first.
                Err(PersistenceError::DuplicateRecord(_)) => {
                    stored = self.repo.load_records().await?;
                }
                Err(e) => return Err(e.into()),
            }
            tracing::info!("Seeded empty history with the start record");
        }

        let records = Self::decode_all(stored)?;
        self.current = records
            .values()
            .next_back()
            .map(|r| r.position.clone())
            .unwrap_or_else(Position::standard);
        self.records = records;
        self.loaded = true;
        tracing::debug!(records = self.records.len(), "Loaded history");
        Ok(())
    }

    /// Copy of the working position.
    pub fn current_game(&self) -> Position {
        self.current.clone()
    }

    pub fn get(&self, id: u32) -> Option<GameRecord> {
        self.records.get(&id).cloned()
    }

    pub fn latest(&self) -> Option<GameRecord> {
        self.records.values().next_back().cloned()
    }

    pub fn record_ids(&self) -> Vec<u32> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(id, SAN)` of every record after the start record.
    pub fn move_list(&self) -> Vec<(u32, String)> {
        self.records
            .values()
            .filter(|r| r.id != START_RECORD_ID)
            .map(|r| (r.id, r.move_san.clone()))
            .collect()
    }

    /// Diff mask between two stored records by id.
    pub fn board_square_changes(&self, a: u32, b: u32) -> u64 {
        record_square_changes(self.records.get(&a), self.records.get(&b))
    }

    async fn append(
        &mut self,
        mut position: Position,
        move_san: &str,
        white_ms: i32,
        black_ms: i32,
    ) -> Result<u32, StoreError> {
        self.ensure_loaded()?;
        let id = self.max_id().map_or(START_RECORD_ID, |max| max + 1);
        if self.records.contains_key(&id) {
            return Err(StoreError::DuplicateRecord(id));
        }

        position.state.white_clock_offset = white_ms;
        position.state.black_clock_offset = black_ms;
        let record = GameRecord::new(id, position, move_san);
        self.repo.insert_record(&record.to_stored()).await?;

        self.current = record.position.clone();
        self.records.insert(id, record);
        tracing::debug!(id, san = move_san, "Recorded game state");
        self.publish(HistoryChange::Recorded { id });
        Ok(id)
    }

    /// Stamp the clocks on the working position and append it as a new record.
    pub async fn record_game_state(
        &mut self,
        white_ms: i32,
        black_ms: i32,
    ) -> Result<u32, StoreError> {
        self.append(self.current.clone(), "", white_ms, black_ms).await
    }

    /// Play a SAN move on the working position and record the result.
    pub async fn record_move(
        &mut self,
        san: &str,
        white_ms: i32,
        black_ms: i32,
    ) -> Result<u32, StoreError> {
        self.ensure_loaded()?;
        let mut engine = CozyBoard::from_position(&self.current)?;
        play_san(&mut engine, san, true)?;
        self.append(engine.position(), san, white_ms, black_ms).await
    }

    /// Overwrite an existing record in place. Returns `false` when no record
    /// has that id.
    pub async fn update_game_state(&mut self, record: &GameRecord) -> Result<bool, StoreError> {
        self.ensure_loaded()?;
        if !self.records.contains_key(&record.id) {
            return Ok(false);
        }

        if !self.repo.update_record(&record.to_stored()).await? {
            return Ok(false);
        }

        if Some(record.id) == self.max_id() {
            self.current = record.position.clone();
        }
        self.records.insert(record.id, record.clone());
        tracing::debug!(id = record.id, "Updated game state");
        self.publish(HistoryChange::Updated { id: record.id });
        Ok(true)
    }

    /// Remove the latest record. Returns `false` when only the start record
    /// is left.
    pub async fn undo(&mut self) -> Result<bool, StoreError> {
        self.ensure_loaded()?;
        let Some(max) = self.max_id() else {
            return Ok(false);
        };
        if max <= START_RECORD_ID || !self.records.contains_key(&(max - 1)) {
            return Ok(false);
        }

        self.repo.delete_from(max).await?;
        self.records.remove(&max);
        if let Some(latest) = self.records.values().next_back() {
            self.current = latest.position.clone();
        }
        tracing::info!(removed_id = max, "Undid last move");
        self.publish(HistoryChange::Undone { removed_id: max });
        Ok(true)
    }

    /// Drop every record and start over from the initial position.
    pub async fn reset(&mut self) -> Result<(), StoreError> {
        let start = GameRecord::start();
        self.repo.replace_all(&[start.to_stored()]).await?;

        self.current = start.position.clone();
        self.records = BTreeMap::from([(start.id, start)]);
        self.loaded = true;
        tracing::info!("Reset history");
        self.publish(HistoryChange::Reset);
        Ok(())
    }

    /// Atomically replace the whole history, then reload from storage.
    pub async fn replace_all(
        &mut self,
        records: &[GameRecord],
        change: HistoryChange,
    ) -> Result<(), StoreError> {
        check_dense_ids(records.iter().map(|r| &r.id))?;
        let stored: Vec<StoredGameRecord> = records.iter().map(GameRecord::to_stored).collect();
        self.repo.replace_all(&stored).await?;
        self.load().await?;
        self.publish(change);
        Ok(())
    }

    /// Drain pending events and reload when a sibling changed storage or
    /// events were missed. Returns whether a reload happened.
    pub async fn sync_with(
        &mut self,
        rx: &mut broadcast::Receiver<HistoryEvent>,
    ) -> Result<bool, StoreError> {
        let mut stale = false;
        loop {
            match rx.try_recv() {
                Ok(event) if event.origin != self.id => stale = true,
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("History events lagged, skipped {}", skipped);
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if stale {
            self.load().await?;
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Database, SqliteGameRecordRepository};
    use chess::{parse_index, GameStatus, PieceColor};

    async fn test_store() -> (Database, GameRecordStore<SqliteGameRecordRepository>) {
        let db = Database::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
        let mut store = GameRecordStore::new(repo);
        store.load().await.unwrap();
        (db, store)
    }

    #[tokio::test]
    async fn test_load_seeds_start_record() {
        let (_db, store) = test_store().await;
        assert_eq!(store.record_ids(), vec![1]);
        let start = store.get(1).unwrap();
        assert_eq!(start.position, Position::standard());
        assert_eq!(start.move_san, "");
        assert_eq!(store.current_game(), Position::standard());
    }

    #[tokio::test]
    async fn test_mutation_before_load_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
        let mut store = GameRecordStore::new(repo);
        assert!(store.latest().is_none());
        assert!(matches!(
            store.record_game_state(0, 0).await,
            Err(StoreError::NotLoaded)
        ));
        assert!(matches!(store.undo().await, Err(StoreError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_record_game_state_stamps_clocks() {
        let (_db, mut store) = test_store().await;
        let id = store.record_game_state(1_500, 2_500).await.unwrap();
        assert_eq!(id, 2);
        let record = store.get(2).unwrap();
        assert_eq!(record.position.state.white_clock_offset, 1_500);
        assert_eq!(record.position.state.black_clock_offset, 2_500);
        assert_eq!(store.current_game(), record.position);
    }

    #[tokio::test]
    async fn test_record_move_appends_san() {
        let (_db, mut store) = test_store().await;
        store.record_move("e4", 100, 0).await.unwrap();
        store.record_move("e5", 100, 200).await.unwrap();
        assert_eq!(store.record_ids(), vec![1, 2, 3]);
        assert_eq!(
            store.move_list(),
            vec![(2, "e4".to_string()), (3, "e5".to_string())]
        );
        assert_eq!(store.current_game().state.active_color, PieceColor::White);
    }

    #[tokio::test]
    async fn test_illegal_move_records_nothing() {
        let (_db, mut store) = test_store().await;
        let err = store.record_move("e5", 0, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::San(SanError::NoLegalOrigin(_))));
        assert_eq!(store.record_ids(), vec![1]);
        assert_eq!(store.current_game(), Position::standard());
    }

    #[tokio::test]
    async fn test_undo_restores_previous_snapshot() {
        let (_db, mut store) = test_store().await;
        store.record_move("d4", 0, 0).await.unwrap();
        let before = store.current_game();

        store.record_move("Nf6", 0, 0).await.unwrap();
        assert!(store.undo().await.unwrap());
        assert_eq!(store.current_game().board_string(), before.board_string());
        assert_eq!(store.current_game().state_string(), before.state_string());
        assert_eq!(store.record_ids(), vec![1, 2]);

        assert!(store.undo().await.unwrap());
        assert!(!store.undo().await.unwrap());
        assert_eq!(store.record_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_undo_persists() {
        let (db, mut store) = test_store().await;
        store.record_move("c4", 0, 0).await.unwrap();
        store.undo().await.unwrap();

        let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
        let mut other = GameRecordStore::new(repo);
        other.load().await.unwrap();
        assert_eq!(other.record_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_update_game_state_in_place() {
        let (_db, mut store) = test_store().await;
        store.record_move("e4", 0, 0).await.unwrap();

        let mut latest = store.latest().unwrap();
        latest.position.state.castling = chess::CastlingRights::NONE;
        assert!(store.update_game_state(&latest).await.unwrap());
        assert_eq!(store.record_ids(), vec![1, 2]);
        assert_eq!(store.current_game(), latest.position);

        // Editing an older record leaves the working position alone.
        let mut start = store.get(1).unwrap();
        start.position.board[parse_index("a1").unwrap()] = 0;
        assert!(store.update_game_state(&start).await.unwrap());
        assert_eq!(store.current_game(), latest.position);
        assert_eq!(store.get(1).unwrap(), start);

        let missing = GameRecord::new(9, Position::standard(), "");
        assert!(!store.update_game_state(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_returns_to_start() {
        let (_db, mut store) = test_store().await;
        store.record_move("e4", 0, 0).await.unwrap();
        store.record_move("e5", 0, 0).await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.record_ids(), vec![1]);
        assert_eq!(store.current_game(), Position::standard());
        assert_eq!(store.current_game().state.status, GameStatus::Ready);
    }

    #[tokio::test]
    async fn test_square_changes_between_records() {
        let (_db, mut store) = test_store().await;
        store.record_move("e4", 0, 0).await.unwrap();

        let mask = store.board_square_changes(1, 2);
        let e2 = parse_index("e2").unwrap();
        let e4 = parse_index("e4").unwrap();
        assert_eq!(mask, (1u64 << (63 - e2)) | (1u64 << (63 - e4)));
        assert_eq!(mask, store.board_square_changes(2, 1));
        assert_eq!(store.board_square_changes(2, 2), 0);
        assert_eq!(store.board_square_changes(1, 42), 0);
    }

    #[tokio::test]
    async fn test_terminal_game_refuses_moves() {
        let (_db, mut store) = test_store().await;
        for san in ["f3", "e5", "g4", "Qh4#"] {
            store.record_move(san, 0, 0).await.unwrap();
        }
        assert_eq!(store.current_game().state.status, GameStatus::Checkmate);
        assert!(store.record_move("a3", 0, 0).await.is_err());

        // Undo steps back out of the terminal state.
        store.undo().await.unwrap();
        assert_eq!(store.current_game().state.status, GameStatus::Ready);
    }

    #[tokio::test]
    async fn test_replace_all_requires_dense_ids() {
        let (_db, mut store) = test_store().await;
        let records = vec![
            GameRecord::start(),
            GameRecord::new(3, Position::standard(), "e4"),
        ];
        let err = store
            .replace_all(&records, HistoryChange::Restored { record_count: 2 })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NonDenseIds {
                expected: 2,
                found: 3
            }
        ));
        assert!(matches!(
            store
                .replace_all(&[], HistoryChange::Restored { record_count: 0 })
                .await,
            Err(StoreError::EmptyHistory)
        ));
    }
}
