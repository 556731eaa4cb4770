//! Database migrations and initialization.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use tracing::info;

/// Initialize the SQLite database with schema and pragmas.
///
/// Creates the file (and its parent directory) if missing. Safe to call
/// again on an existing or freshly restored database file.
pub async fn init_db(db_path: impl AsRef<Path>) -> Result<SqlitePool, sqlx::Error> {
    let db_path = db_path.as_ref();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!(path = %db_path.display(), "Database initialized successfully");
    Ok(pool)
}

/// Open `db_path` read-only and check that it is an intact SQLite database
/// holding the records table.
pub async fn check_database_file(db_path: impl AsRef<Path>) -> Result<(), sqlx::Error> {
    let mut conn = SqliteConnectOptions::new()
        .filename(db_path.as_ref())
        .read_only(true)
        .connect()
        .await?;

    let checked = inspect_database(&mut conn).await;
    conn.close().await?;
    checked
}

async fn inspect_database(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let verdict: String = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(&mut *conn)
        .await?;
    if verdict != "ok" {
        return Err(sqlx::Error::Protocol(format!("integrity check failed: {}", verdict)));
    }

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'inspection_records'",
    )
    .fetch_one(&mut *conn)
    .await?;
    if tables == 0 {
        return Err(sqlx::Error::Protocol("no inspection_records table".to_string()));
    }
    Ok(())
}

/// Run all database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    let schema_sql = include_str!("schema.sql");

    for statement in schema_sql.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Configure SQLite pragmas.
///
/// The rollback journal (`DELETE`) keeps every committed transaction in the
/// main file, so a byte copy of that one file is a complete database.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = DELETE")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!(journal_mode = %journal_mode, "SQLite journal mode set");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = FULL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_db_creates_database_and_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("database").join("app.db");

        let pool = init_db(&db_path).await.expect("init_db failed");
        assert!(db_path.exists());

        let result: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("app.db"))
            .await
            .expect("init_db failed");

        for table in ["inspection_records", "attachments", "notifications"] {
            let result: (String,) =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .expect("query failed");
            assert_eq!(result.0, table);
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("app.db");
        let pool = init_db(&db_path).await.expect("init_db failed");

        run_migrations(&pool)
            .await
            .expect("second migration run failed");
        pool.close().await;

        init_db(&db_path).await.expect("reopen failed");
    }

    #[tokio::test]
    async fn test_pragmas_configured() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("app.db"))
            .await
            .expect("init_db failed");

        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, "delete");
    }

    #[tokio::test]
    async fn test_check_database_file_accepts_only_migrated_databases() {
        let temp_dir = TempDir::new().unwrap();

        let good = temp_dir.path().join("app.db");
        init_db(&good).await.expect("init_db failed").close().await;
        check_database_file(&good).await.expect("migrated database rejected");

        let garbage = temp_dir.path().join("garbage.db");
        std::fs::write(&garbage, vec![0x41u8; 8192]).unwrap();
        assert!(check_database_file(&garbage).await.is_err());

        let empty = temp_dir.path().join("empty.db");
        std::fs::write(&empty, b"").unwrap();
        assert!(check_database_file(&empty).await.is_err());

        let missing = temp_dir.path().join("missing.db");
        assert!(check_database_file(&missing).await.is_err());
        assert!(!missing.exists());
    }
}
