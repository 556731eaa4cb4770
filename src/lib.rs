pub mod api;
pub mod backup;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;

pub use backup::{BackupError, BackupService, BackupSettings};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Attachment, BasicData, InspectionRecord, InspectionResults, Notification};
pub use error::AppError;
