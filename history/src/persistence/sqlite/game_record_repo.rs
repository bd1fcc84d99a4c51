//! SQLite-backed repository for game records.

use sqlx::SqlitePool;

use crate::persistence::traits::GameRecordRepository;
use crate::persistence::PersistenceError;
use crate::record::StoredGameRecord;

/// Row type for record queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    board_square_str: String,
    game_state_str: String,
    move_san_str: String,
}

impl From<RecordRow> for StoredGameRecord {
    fn from(r: RecordRow) -> Self {
        Self {
            id: r.id as u32,
            board_square_str: r.board_square_str,
            game_state_str: r.game_state_str,
            move_san_str: r.move_san_str,
        }
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO GameRecord (Id, BoardSquareStr, GameStateStr, MoveSANStr)
    VALUES (?, ?, ?, ?)
    "#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLite implementation of [`GameRecordRepository`].
#[derive(Clone)]
pub struct SqliteGameRecordRepository {
    pool: SqlitePool,
}

impl SqliteGameRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl GameRecordRepository for SqliteGameRecordRepository {
    async fn load_records(&self) -> Result<Vec<StoredGameRecord>, PersistenceError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
                SELECT Id AS id, BoardSquareStr AS board_square_str,
                       GameStateStr AS game_state_str, MoveSANStr AS move_san_str
                FROM GameRecord
                ORDER BY Id
                "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredGameRecord::from).collect())
    }

    async fn insert_record(&self, record: &StoredGameRecord) -> Result<(), PersistenceError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(i64::from(record.id))
            .bind(&record.board_square_str)
            .bind(&record.game_state_str)
            .bind(&record.move_san_str)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(PersistenceError::DuplicateRecord(record.id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_record(&self, record: &StoredGameRecord) -> Result<bool, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE GameRecord
            SET BoardSquareStr = ?, GameStateStr = ?, MoveSANStr = ?
            WHERE Id = ?
            "#,
        )
        .bind(&record.board_square_str)
        .bind(&record.game_state_str)
        .bind(&record.move_san_str)
        .bind(i64::from(record.id))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_from(&self, id: u32) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM GameRecord WHERE Id >= ?")
            .bind(i64::from(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_all(&self, records: &[StoredGameRecord]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM GameRecord")
            .execute(&mut *tx)
            .await?;

        for record in records {
            let inserted = sqlx::query(INSERT_SQL)
                .bind(i64::from(record.id))
                .bind(&record.board_square_str)
                .bind(&record.game_state_str)
                .bind(&record.move_san_str)
                .execute(&mut *tx)
                .await;
            if let Err(e) = inserted {
                // Dropping the transaction rolls it back.
                return Err(if is_unique_violation(&e) {
                    PersistenceError::DuplicateRecord(record.id)
                } else {
                    e.into()
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
