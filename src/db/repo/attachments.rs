//! Attachment operations.

use super::{get_timestamp, Repository};
use crate::domain::timestamp;
use crate::domain::Attachment;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Repository {
    /// Insert an attachment.
    ///
    /// # Errors
    /// Returns a foreign key violation if `record_id` names no record.
    pub async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), sqlx::Error> {
        let pool = self.pool().await;
        sqlx::query(
            r#"
            INSERT INTO attachments (id, name, file_path, content_type, size, record_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attachment.id)
        .bind(&attachment.name)
        .bind(&attachment.file_path)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(attachment.record_id.as_deref())
        .bind(timestamp::to_db(&attachment.created_at))
        .execute(&pool)
        .await?;

        Ok(())
    }

    pub async fn get_attachment(&self, id: &str) -> Result<Option<Attachment>, sqlx::Error> {
        let pool = self.pool().await;
        let row = sqlx::query(
            r#"
            SELECT id, name, file_path, content_type, size, record_id, created_at
            FROM attachments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?;

        row.as_ref().map(attachment_from_row).transpose()
    }

    /// Attachments of a record, oldest first.
    pub async fn list_attachments_for_record(
        &self,
        record_id: &str,
    ) -> Result<Vec<Attachment>, sqlx::Error> {
        let pool = self.pool().await;
        let rows = sqlx::query(
            r#"
            SELECT id, name, file_path, content_type, size, record_id, created_at
            FROM attachments
            WHERE record_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&pool)
        .await?;

        rows.iter().map(attachment_from_row).collect()
    }

    pub async fn delete_attachment(&self, id: &str) -> Result<bool, sqlx::Error> {
        let pool = self.pool().await;
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn attachment_from_row(row: &SqliteRow) -> Result<Attachment, sqlx::Error> {
    Ok(Attachment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        file_path: row.try_get("file_path")?,
        content_type: row.try_get("content_type")?,
        size: row.try_get("size")?,
        record_id: row.try_get("record_id")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{
        BasicData, InspectionRecord, InspectionResults, NewAttachment, NewRecord,
    };

    fn attachment(record_id: Option<&str>, name: &str) -> Attachment {
        Attachment::new(NewAttachment {
            name: name.to_string(),
            file_path: format!("uploads/{}", name),
            content_type: "image/jpeg".to_string(),
            size: 512,
            record_id: record_id.map(str::to_string),
        })
    }

    async fn insert_record(repo: &Repository) -> InspectionRecord {
        let record = InspectionRecord::new(NewRecord {
            serial_number: "2024-00001".to_string(),
            basic_data: BasicData::default(),
            inspection_results: InspectionResults::new(),
            recommendations: None,
            created_by: "admin".to_string(),
        });
        repo.insert_record(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_unattached_attachment_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let a = attachment(None, "shelf.jpg");
        repo.insert_attachment(&a).await.unwrap();

        assert_eq!(repo.get_attachment(&a.id).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_unknown_record_reference_is_rejected() {
        let (repo, _temp) = setup_test_db().await;
        let err = repo
            .insert_attachment(&attachment(Some("no-such-record"), "shelf.jpg"))
            .await
            .unwrap_err();
        assert!(err
            .as_database_error()
            .is_some_and(|e| e.is_foreign_key_violation()));
    }

    #[tokio::test]
    async fn test_record_deletion_cascades_to_attachments() {
        let (repo, _temp) = setup_test_db().await;
        let record = insert_record(&repo).await;
        let owned = attachment(Some(&record.id), "shelf.jpg");
        let loose = attachment(None, "misc.pdf");
        repo.insert_attachment(&owned).await.unwrap();
        repo.insert_attachment(&loose).await.unwrap();

        assert_eq!(
            repo.list_attachments_for_record(&record.id)
                .await
                .unwrap()
                .len(),
            1
        );

        assert!(repo.delete_record(&record.id).await.unwrap());
        assert!(repo.get_attachment(&owned.id).await.unwrap().is_none());
        assert!(repo.get_attachment(&loose.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_attachment() {
        let (repo, _temp) = setup_test_db().await;
        let a = attachment(None, "shelf.jpg");
        repo.insert_attachment(&a).await.unwrap();

        assert!(repo.delete_attachment(&a.id).await.unwrap());
        assert!(!repo.delete_attachment(&a.id).await.unwrap());
    }
}
