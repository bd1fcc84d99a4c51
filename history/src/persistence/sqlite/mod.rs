//! SQLite-backed repository implementation.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers, so
//!   several stores can share one file.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/001_game_record.sql`
//!   automatically when [`Database::open`] is called. The schema is idempotent.
//!
//! [`SqliteGameRecordRepository`] holds a `SqlitePool` and implements
//! [`crate::persistence::traits::GameRecordRepository`] over the
//! `GameRecord` table.

mod database;
mod game_record_repo;
#[cfg(test)]
mod integration_tests;

pub use database::Database;
pub use game_record_repo::SqliteGameRecordRepository;
