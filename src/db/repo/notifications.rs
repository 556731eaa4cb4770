//! Notification operations.

use super::{get_timestamp, Repository};
use crate::domain::timestamp;
use crate::domain::Notification;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const NOTIFICATION_COLUMNS: &str =
    "id, title, message, type, user_id, record_id, is_read, created_at, updated_at";

impl Repository {
    /// Insert a notification.
    ///
    /// # Errors
    /// Returns a foreign key violation if `record_id` names no record.
    pub async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), sqlx::Error> {
        let pool = self.pool().await;
        sqlx::query(&format!(
            "INSERT INTO notifications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            NOTIFICATION_COLUMNS
        ))
        .bind(&notification.id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(&notification.user_id)
        .bind(notification.record_id.as_deref())
        .bind(notification.is_read)
        .bind(timestamp::to_db(&notification.created_at))
        .bind(timestamp::to_db(&notification.updated_at))
        .execute(&pool)
        .await?;

        Ok(())
    }

    pub async fn get_notification(&self, id: &str) -> Result<Option<Notification>, sqlx::Error> {
        let pool = self.pool().await;
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    /// Notifications for a user, newest first.
    pub async fn list_notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let pool = self.pool().await;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications \
             WHERE user_id = ? AND (? = 0 OR is_read = 0) \
             ORDER BY created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Mark a notification read and return it.
    ///
    /// Returns `None` if no notification has this id.
    pub async fn mark_notification_read(
        &self,
        id: &str,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let Some(mut notification) = self.get_notification(id).await? else {
            return Ok(None);
        };
        notification.mark_read();

        let pool = self.pool().await;
        sqlx::query(
            "UPDATE notifications SET is_read = 1, updated_at = MAX(?, created_at) WHERE id = ?",
        )
        .bind(timestamp::to_db(&notification.updated_at))
        .bind(id)
        .execute(&pool)
        .await?;

        Ok(Some(notification))
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, sqlx::Error> {
    Ok(Notification {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        kind: row.try_get("type")?,
        user_id: row.try_get("user_id")?,
        record_id: row.try_get("record_id")?,
        is_read: row.try_get("is_read")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{
        BasicData, InspectionRecord, InspectionResults, NewNotification, NewRecord,
    };

    fn notification(user_id: &str, record_id: Option<&str>) -> Notification {
        Notification::new(NewNotification {
            title: "New inspection".to_string(),
            message: "An inspection was filed".to_string(),
            kind: None,
            user_id: user_id.to_string(),
            record_id: record_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_list_for_user_and_unread_filter() {
        let (repo, _temp) = setup_test_db().await;
        let first = notification("user-1", None);
        let mut second = notification("user-1", None);
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        second.updated_at = second.created_at;
        repo.insert_notification(&first).await.unwrap();
        repo.insert_notification(&second).await.unwrap();
        repo.insert_notification(&notification("user-2", None))
            .await
            .unwrap();

        let all = repo.list_notifications_for_user("user-1", false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let read = repo.mark_notification_read(&first.id).await.unwrap().unwrap();
        assert!(read.is_read);

        let unread = repo.list_notifications_for_user("user-1", true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);

        let stored = repo.get_notification(&first.id).await.unwrap().unwrap();
        assert!(stored.is_read);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn test_mark_missing_notification_read() {
        let (repo, _temp) = setup_test_db().await;
        assert!(repo.mark_notification_read("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_deletion_nulls_notification_reference() {
        let (repo, _temp) = setup_test_db().await;
        let record = InspectionRecord::new(NewRecord {
            serial_number: "2024-00001".to_string(),
            basic_data: BasicData::default(),
            inspection_results: InspectionResults::new(),
            recommendations: None,
            created_by: "admin".to_string(),
        });
        repo.insert_record(&record).await.unwrap();

        let n = notification("user-1", Some(&record.id));
        repo.insert_notification(&n).await.unwrap();

        repo.delete_record(&record.id).await.unwrap();

        let kept = repo.get_notification(&n.id).await.unwrap().unwrap();
        assert_eq!(kept.record_id, None);
    }
}
