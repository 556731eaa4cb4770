//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `records.rs` - Inspection record operations
//! - `attachments.rs` - Attachment operations
//! - `notifications.rs` - Notification operations
//!
//! The pool lives behind a lock so the backup service can swap the
//! underlying database file while no connection is open.

mod attachments;
mod notifications;
mod records;

pub use records::RecordPage;

use crate::db::migrations::init_db;
use crate::domain::timestamp;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Repository for database operations.
pub struct Repository {
    pool: RwLock<SqlitePool>,
    db_path: PathBuf,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    ///
    /// `db_path` must be the file the pool was opened on; it is used to
    /// reopen the pool after the file is replaced.
    pub fn new(pool: SqlitePool, db_path: impl Into<PathBuf>) -> Self {
        Repository {
            pool: RwLock::new(pool),
            db_path: db_path.into(),
        }
    }

    /// Path of the live database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Current connection pool.
    pub(crate) async fn pool(&self) -> SqlitePool {
        self.pool.read().await.clone()
    }

    /// Run a trivial query against the live database.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let pool = self.pool().await;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    // =========================================================================
    // Database file control
    // =========================================================================

    /// Run `f` while holding the SQLite write lock on the live database.
    ///
    /// Other writers block until `f` finishes; readers continue. The lock is
    /// taken with `BEGIN IMMEDIATE` and released with `ROLLBACK`, so nothing
    /// is written by this call itself.
    ///
    /// # Errors
    /// Returns the error of `f`, or a database error if the lock cannot be taken.
    pub async fn with_write_lock<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<sqlx::Error>,
    {
        let pool = self.pool().await;
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = f().await;

        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(error = %e, "Failed to release database write lock, discarding connection");
            drop(conn.detach());
        }

        outcome
    }

    /// Close every connection, run `f`, then reopen the pool.
    ///
    /// `f` may replace the database file. Queries issued meanwhile wait for
    /// the new pool. Migrations are re-applied on reopen.
    ///
    /// # Errors
    /// Returns the error of `f`; if `f` succeeded but the reopen fails, the
    /// reopen error.
    pub async fn replace_database_file<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<sqlx::Error>,
    {
        let mut pool = self.pool.write().await;
        pool.close().await;
        info!(path = %self.db_path.display(), "Database pool closed for file replacement");

        let outcome = f().await;

        match init_db(&self.db_path).await {
            Ok(reopened) => {
                *pool = reopened;
                info!(path = %self.db_path.display(), "Database pool reopened");
                outcome
            }
            Err(e) => {
                error!(path = %self.db_path.display(), error = %e, "Failed to reopen database");
                match outcome {
                    Err(original) => Err(original),
                    Ok(_) => Err(e.into()),
                }
            }
        }
    }
}

/// Read a timestamp TEXT column.
pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    timestamp::from_db(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_contains(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{BasicData, InspectionRecord, InspectionResults, NewRecord};

    fn record(serial: &str) -> InspectionRecord {
        InspectionRecord::new(NewRecord {
            serial_number: serial.to_string(),
            basic_data: BasicData::default(),
            inspection_results: InspectionResults::new(),
            recommendations: None,
            created_by: "admin".to_string(),
        })
    }

    #[test]
    fn test_like_contains_escapes_wildcards() {
        assert_eq!(like_contains("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_contains("plain"), "%plain%");
    }

    #[tokio::test]
    async fn test_with_write_lock_blocks_writers_until_released() {
        let (repo, _temp) = setup_test_db().await;

        let outcome: Result<bool, sqlx::Error> = repo
            .with_write_lock(|| async {
                // A second writer on its own connection must not get in.
                let pool = repo.pool().await;
                let mut other = pool.acquire().await?;
                sqlx::query("PRAGMA busy_timeout = 0")
                    .execute(&mut *other)
                    .await?;
                let blocked = sqlx::query("BEGIN IMMEDIATE")
                    .execute(&mut *other)
                    .await
                    .is_err();
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *other)
                    .await?;
                Ok(blocked)
            })
            .await;

        assert!(outcome.unwrap(), "second writer acquired the lock");

        // Released afterwards.
        repo.insert_record(&record("2024-00001")).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_database_file_reopens_on_new_file() {
        let (repo, temp) = setup_test_db().await;
        repo.insert_record(&record("2024-00001")).await.unwrap();

        // Build a second database with different contents.
        let other_path = temp.path().join("other.db");
        let other_pool = init_db(&other_path).await.unwrap();
        let other = Repository::new(other_pool, &other_path);
        other.insert_record(&record("2024-00042")).await.unwrap();
        other.pool().await.close().await;

        let live = repo.db_path().to_path_buf();
        let swapped: Result<(), sqlx::Error> = repo
            .replace_database_file(|| async {
                std::fs::rename(&other_path, &live).map_err(sqlx::Error::Io)
            })
            .await;
        swapped.unwrap();

        let (records, total) = repo
            .list_records(RecordPage::new(1, 10), None)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].serial_number, "2024-00042");
    }

    #[tokio::test]
    async fn test_replace_database_file_keeps_pool_usable_after_failure() {
        let (repo, _temp) = setup_test_db().await;

        let result: Result<(), sqlx::Error> = repo
            .replace_database_file(|| async { Err(sqlx::Error::PoolClosed) })
            .await;
        assert!(result.is_err());

        repo.insert_record(&record("2024-00001")).await.unwrap();
    }
}
