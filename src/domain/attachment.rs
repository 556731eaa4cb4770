//! File references attached to inspection records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::timestamp;

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub file_path: String,
    pub content_type: String,
    pub size: i64,
    pub record_id: Option<String>,
}

/// A stored file, optionally owned by a record.
///
/// Deleting the owning record deletes the attachment row as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub content_type: String,
    pub size: i64,
    pub record_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(new: NewAttachment) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            file_path: new.file_path,
            content_type: new.content_type,
            size: new.size,
            record_id: new.record_id,
            created_at: timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unattached_projection() {
        let attachment = Attachment::new(NewAttachment {
            name: "license.pdf".to_string(),
            file_path: "uploads/license.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 2048,
            record_id: None,
        });

        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["filePath"], "uploads/license.pdf");
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["size"], 2048);
        assert!(json["recordId"].is_null());
        assert!(json["createdAt"].is_string());
    }
}
