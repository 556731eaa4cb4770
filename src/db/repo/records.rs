//! Inspection record operations.

use super::{get_timestamp, like_contains, Repository};
use crate::domain::timestamp;
use crate::domain::{BasicData, InspectionRecord, InspectionResults};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

const MAX_PER_PAGE: u32 = 100;

const RECORD_COLUMNS: &str = "id, serial_number, basic_data, inspection_results, recommendations, \
                              created_at, created_by, updated_at";

// `?1` is the LIKE pattern or NULL for no search.
const SEARCH_CLAUSE: &str = r#"
    ?1 IS NULL
    OR serial_number LIKE ?1 ESCAPE '\'
    OR (json_valid(basic_data) AND (
        json_extract(basic_data, '$.institutionName') LIKE ?1 ESCAPE '\'
        OR json_extract(basic_data, '$.inspectionLocation') LIKE ?1 ESCAPE '\'
        OR json_extract(basic_data, '$.presentPharmacist') LIKE ?1 ESCAPE '\'
    ))
"#;

/// One-based page of a record listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPage {
    pub page: u32,
    pub per_page: u32,
}

impl RecordPage {
    /// Clamp to `page >= 1` and `1 <= per_page <= 100`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }

    /// Number of pages needed for `total` rows.
    pub fn page_count(&self, total: i64) -> i64 {
        let per_page = i64::from(self.per_page);
        (total.max(0) + per_page - 1) / per_page
    }
}

impl Default for RecordPage {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

impl Repository {
    /// Insert a new record.
    ///
    /// # Errors
    /// Returns a unique violation if the serial number is taken.
    pub async fn insert_record(&self, record: &InspectionRecord) -> Result<(), sqlx::Error> {
        let pool = self.pool().await;
        sqlx::query(
            r#"
            INSERT INTO inspection_records (
                id, serial_number, basic_data, inspection_results, recommendations,
                created_at, created_by, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.serial_number)
        .bind(encode(record.basic_data.to_column())?)
        .bind(encode(record.inspection_results.to_column())?)
        .bind(record.recommendations.as_deref())
        .bind(timestamp::to_db(&record.created_at))
        .bind(&record.created_by)
        .bind(timestamp::to_db(&record.updated_at))
        .execute(&pool)
        .await?;

        info!(
            record_id = %record.id,
            serial_number = %record.serial_number,
            "Inspection record created"
        );
        Ok(())
    }

    /// Fetch a record by id.
    pub async fn get_record(&self, id: &str) -> Result<Option<InspectionRecord>, sqlx::Error> {
        let pool = self.pool().await;
        let row = sqlx::query(&format!(
            "SELECT {} FROM inspection_records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// List records newest first, optionally filtered by a free-text search
    /// over serial number, institution name, location and pharmacist.
    ///
    /// Returns the requested page and the total number of matching records.
    pub async fn list_records(
        &self,
        page: RecordPage,
        search: Option<&str>,
    ) -> Result<(Vec<InspectionRecord>, i64), sqlx::Error> {
        let pool = self.pool().await;
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_contains);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM inspection_records WHERE {}",
            SEARCH_CLAUSE
        ))
        .bind(pattern.as_deref())
        .fetch_one(&pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM inspection_records WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            RECORD_COLUMNS, SEARCH_CLAUSE
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(page.per_page))
        .bind(page.offset())
        .fetch_all(&pool)
        .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, total))
    }

    /// All records, newest first.
    pub async fn all_records(&self) -> Result<Vec<InspectionRecord>, sqlx::Error> {
        let pool = self.pool().await;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inspection_records ORDER BY created_at DESC, id DESC",
            RECORD_COLUMNS
        ))
        .fetch_all(&pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Persist every mutable field of an existing record.
    ///
    /// Returns `false` if no record has this id.
    pub async fn update_record(&self, record: &InspectionRecord) -> Result<bool, sqlx::Error> {
        let pool = self.pool().await;
        let result = sqlx::query(
            r#"
            UPDATE inspection_records
            SET serial_number = ?,
                basic_data = ?,
                inspection_results = ?,
                recommendations = ?,
                updated_at = MAX(?, created_at)
            WHERE id = ?
            "#,
        )
        .bind(&record.serial_number)
        .bind(encode(record.basic_data.to_column())?)
        .bind(encode(record.inspection_results.to_column())?)
        .bind(record.recommendations.as_deref())
        .bind(timestamp::to_db(&record.updated_at))
        .bind(&record.id)
        .execute(&pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a record and its attachments; notifications keep existing
    /// with their record reference cleared.
    ///
    /// Done explicitly rather than through the schema's `ON DELETE` rules
    /// so that databases restored from older backups behave the same.
    pub async fn delete_record(&self, id: &str) -> Result<bool, sqlx::Error> {
        let pool = self.pool().await;
        let mut tx = pool.begin().await?;
        let now = timestamp::to_db(&timestamp::now());

        let attachments = sqlx::query("DELETE FROM attachments WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            "UPDATE notifications SET record_id = NULL, updated_at = MAX(?, created_at) \
             WHERE record_id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM inspection_records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if deleted {
            info!(record_id = %id, attachments, "Inspection record deleted");
        }
        Ok(deleted)
    }

    /// Next free serial number of the form `YYYY-NNNNN`.
    pub async fn next_serial_number(&self, year: i32) -> Result<String, sqlx::Error> {
        let pool = self.pool().await;
        let mut next: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(rowid), 0) + 1 FROM inspection_records")
                .fetch_one(&pool)
                .await?;

        loop {
            let candidate = format!("{}-{:05}", year, next);
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM inspection_records WHERE serial_number = ?)",
            )
            .bind(&candidate)
            .fetch_one(&pool)
            .await?;
            if !taken {
                return Ok(candidate);
            }
            next += 1;
        }
    }
}

fn encode(column: Result<String, serde_json::Error>) -> Result<String, sqlx::Error> {
    column.map_err(|e| sqlx::Error::Protocol(format!("cannot encode JSON column: {}", e)))
}

fn decode_error(column: &str, err: serde_json::Error) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<InspectionRecord, sqlx::Error> {
    let basic_data: Option<String> = row.try_get("basic_data")?;
    let inspection_results: Option<String> = row.try_get("inspection_results")?;

    Ok(InspectionRecord {
        id: row.try_get("id")?,
        serial_number: row.try_get("serial_number")?,
        basic_data: BasicData::from_column(basic_data.as_deref().unwrap_or_default())
            .map_err(|e| decode_error("basic_data", e))?,
        inspection_results: InspectionResults::from_column(
            inspection_results.as_deref().unwrap_or_default(),
        )
        .map_err(|e| decode_error("inspection_results", e))?,
        recommendations: row.try_get("recommendations")?,
        created_at: get_timestamp(row, "created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}
