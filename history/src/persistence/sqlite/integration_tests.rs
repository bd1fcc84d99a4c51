//! Several stores sharing one database, kept in step by reload events.

use std::sync::Arc;

use super::{Database, SqliteGameRecordRepository};
use crate::importer::import_pgn;
use crate::notify::{HistoryChange, ReloadNotifier};
use crate::persistence::traits::GameRecordRepository;
use crate::store::GameRecordStore;

type Store = GameRecordStore<SqliteGameRecordRepository>;

async fn sibling_stores(db: &Database, notifier: &ReloadNotifier) -> (Store, Store) {
    let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
    let mut a = GameRecordStore::with_notifier(repo.clone(), notifier.clone());
    let mut b = GameRecordStore::with_notifier(repo, notifier.clone());
    a.load().await.unwrap();
    b.load().await.unwrap();
    (a, b)
}

#[tokio::test]
async fn test_sibling_reloads_after_record() {
    let db = Database::new_in_memory().await.unwrap();
    let notifier = ReloadNotifier::new();
    let (mut a, mut b) = sibling_stores(&db, &notifier).await;
    let mut b_rx = notifier.subscribe();

    a.record_move("e4", 0, 0).await.unwrap();
    assert_eq!(b.record_ids(), vec![1]);

    assert!(b.sync_with(&mut b_rx).await.unwrap());
    assert_eq!(b.record_ids(), vec![1, 2]);
    assert_eq!(b.current_game(), a.current_game());

    // Nothing new: no reload.
    assert!(!b.sync_with(&mut b_rx).await.unwrap());
}

#[tokio::test]
async fn test_own_events_do_not_trigger_reload() {
    let db = Database::new_in_memory().await.unwrap();
    let notifier = ReloadNotifier::new();
    let (mut a, _b) = sibling_stores(&db, &notifier).await;
    let mut a_rx = a.subscribe().unwrap();

    a.record_move("d4", 0, 0).await.unwrap();
    a.undo().await.unwrap();
    assert!(!a.sync_with(&mut a_rx).await.unwrap());
}

#[tokio::test]
async fn test_import_notifies_siblings() {
    let db = Database::new_in_memory().await.unwrap();
    let notifier = ReloadNotifier::new();
    let (mut a, mut b) = sibling_stores(&db, &notifier).await;
    let mut rx = notifier.subscribe();

    import_pgn(&mut a, "1. e4 e5 2. Nf3 Nc6").await.unwrap();
    let event = rx.recv().await.unwrap();
    assert_eq!(event.origin, a.id());
    assert_eq!(event.change, HistoryChange::Imported { record_count: 5 });

    let mut b_rx = notifier.subscribe();
    b.reset().await.unwrap();
    assert!(a.sync_with(&mut rx).await.unwrap());
    assert_eq!(a.record_ids(), vec![1]);
    assert!(!b.sync_with(&mut b_rx).await.unwrap());
}

#[tokio::test]
async fn test_stale_sibling_cannot_overwrite_record() {
    let db = Database::new_in_memory().await.unwrap();
    let notifier = ReloadNotifier::new();
    let (mut a, mut b) = sibling_stores(&db, &notifier).await;

    a.record_move("e4", 0, 0).await.unwrap();
    // b still believes record 2 is free.
    assert!(b.record_move("d4", 0, 0).await.is_err());

    let repo = SqliteGameRecordRepository::new(db.pool().clone());
    let stored = repo.load_records().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].move_san_str, "e4");
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game_record.db");
    {
        let db = Database::open(&path).await.unwrap();
        let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
        let mut store = GameRecordStore::new(repo);
        store.load().await.unwrap();
        store.record_move("Nf3", 1_000, 0).await.unwrap();
        db.pool().close().await;
    }

    let db = Database::open(&path).await.unwrap();
    let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
    let mut store = GameRecordStore::new(repo);
    store.load().await.unwrap();
    assert_eq!(store.move_list(), vec![(2, "Nf3".to_string())]);
    assert_eq!(store.current_game().state.white_clock_offset, 1_000);
}
