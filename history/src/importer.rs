//! PGN import: replay the movetext off the async runtime, then swap the
//! store's contents in one transaction.

use chess::pgn::{replay, ImportedGame, PgnError};

use crate::notify::HistoryChange;
use crate::persistence::GameRecordRepository;
use crate::record::{GameRecord, START_RECORD_ID};
use crate::store::{GameRecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Pgn(#[from] PgnError),
    #[error("Import failed. Could not save the game: {0}")]
    Store(#[from] StoreError),
    #[error("Import worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Turn a replayed game into dense records starting at id 1.
pub fn records_from_game(game: ImportedGame) -> Vec<GameRecord> {
    let mut records = Vec::with_capacity(game.plies.len() + 1);
    records.push(GameRecord::new(START_RECORD_ID, game.start, ""));
    for (id, ply) in (START_RECORD_ID + 1..).zip(game.plies) {
        records.push(GameRecord::new(id, ply.position, ply.san));
    }
    records
}

/// Import PGN text into `store`, replacing its history. Returns the number
/// of records now stored. On any failure storage is left as it was.
pub async fn import_pgn<R: GameRecordRepository>(
    store: &mut GameRecordStore<R>,
    text: &str,
) -> Result<usize, ImportError> {
    let text = text.to_owned();
    tracing::info!(bytes = text.len(), "Importing PGN");

    let replayed = tokio::task::spawn_blocking(move || replay(&text)).await?;
    let game = match replayed {
        Ok(game) => game,
        Err(e) => {
            tracing::warn!(error = %e, "PGN import rejected");
            return Err(e.into());
        }
    };

    let records = records_from_game(game);
    let record_count = records.len();
    store
        .replace_all(&records, HistoryChange::Imported { record_count })
        .await?;

    tracing::info!(records = record_count, "PGN import complete");
    Ok(record_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Database, SqliteGameRecordRepository};
    use chess::pgn::SanError;
    use chess::{parse_index, BoardEngine, CozyBoard, PieceColor, Position};
    use std::sync::Arc;

    async fn test_store() -> (Database, GameRecordStore<SqliteGameRecordRepository>) {
        let db = Database::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
        let mut store = GameRecordStore::new(repo);
        store.load().await.unwrap();
        (db, store)
    }

    #[tokio::test]
    async fn test_import_four_plies() {
        let (_db, mut store) = test_store().await;
        let count = import_pgn(&mut store, "1. e4 e5 2. Nf3 Nc6").await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(store.record_ids(), vec![1, 2, 3, 4, 5]);
        assert_eq!(store.get(3).unwrap().move_san, "e5");
        assert_eq!(
            store.get(5).unwrap().position.state.active_color,
            store.get(1).unwrap().position.state.active_color
        );
        assert_eq!(
            store.get(1).unwrap().position.state.active_color,
            PieceColor::White
        );
    }

    #[tokio::test]
    async fn test_import_with_captures() {
        let (_db, mut store) = test_store().await;
        import_pgn(&mut store, "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Bxc6 dxc6")
            .await
            .unwrap();
        assert_eq!(store.record_ids().len(), 9);
        // The knight left b8 for c6 and was captured there.
        let last = store.latest().unwrap().position;
        assert_eq!(last.spin(parse_index("b8").unwrap()), 0);
        assert_eq!(last.spin(parse_index("c6").unwrap()), -1);
    }

    #[tokio::test]
    async fn test_imported_snapshots_replay() {
        let (_db, mut store) = test_store().await;
        let pgn = "1. d4 Nf6 2. c4 e6 3. Nc3 Bb4 4. Qc2 O-O 5. a3 Bxc3+ 6. Qxc3";
        import_pgn(&mut store, pgn).await.unwrap();

        let mut board = CozyBoard::new();
        for id in store.record_ids().into_iter().skip(1) {
            let record = store.get(id).unwrap();
            chess::pgn::play_san(&mut board, &record.move_san, true).unwrap();
            assert_eq!(board.position(), record.position, "record {id}");
        }
    }

    #[tokio::test]
    async fn test_failed_import_leaves_store_untouched() {
        let (_db, mut store) = test_store().await;
        import_pgn(&mut store, "1. e4 e5").await.unwrap();
        let before: Vec<_> = store.record_ids();

        let ambiguous = "1. a4 h5 2. h4 a5 3. Ra3 Ra6 4. Rhh3 Rhh6 5. Rd3";
        let err = import_pgn(&mut store, ambiguous).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::Pgn(PgnError::Move {
                source: SanError::AmbiguousMove(_),
                ..
            })
        ));
        assert_eq!(store.record_ids(), before);

        store.load().await.unwrap();
        assert_eq!(store.record_ids(), before);
    }

    #[tokio::test]
    async fn test_empty_import() {
        let (_db, mut store) = test_store().await;
        let err = import_pgn(&mut store, "").await.unwrap_err();
        assert!(matches!(err, ImportError::Pgn(PgnError::EmptyImport)));
        assert_eq!(store.record_ids(), vec![1]);
        assert_eq!(store.current_game(), Position::standard());
    }
}
