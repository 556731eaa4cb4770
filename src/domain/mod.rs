//! Domain types for the inspection record store.
//!
//! This module provides:
//! - InspectionRecord with typed basic data and inspection results
//! - Attachment and Notification entities
//! - Record search filters
//! - Timestamp encoding shared by all persisted entities

pub mod attachment;
pub mod notification;
pub mod record;
pub mod search;
pub mod timestamp;

pub use attachment::{Attachment, NewAttachment};
pub use notification::{NewNotification, Notification, DEFAULT_NOTIFICATION_TYPE};
pub use record::{BasicData, InspectionRecord, InspectionResults, NewRecord, RecordUpdate};
pub use search::RecordFilter;
