//! Per-user notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::timestamp;

pub const DEFAULT_NOTIFICATION_TYPE: &str = "info";

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: Option<String>,
    pub user_id: String,
    pub record_id: Option<String>,
}

/// A message for one user, optionally about a record.
///
/// When the referenced record is deleted `record_id` becomes `None`; the
/// notification itself is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub record_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(new: NewNotification) -> Self {
        let now = timestamp::now();
        let kind = new
            .kind
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_TYPE.to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            message: new.message,
            kind,
            user_id: new.user_id,
            record_id: new.record_id,
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
        self.updated_at = timestamp::touch(&self.created_at);
    }
}
