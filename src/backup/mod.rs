//! Backup and restore of the single-file SQLite database.
//!
//! This module provides:
//! - Backup file naming and allow-list validation
//! - Checksummed copies
//! - `BackupService`: create, download, restore and status operations

pub mod integrity;
pub mod naming;
pub mod service;

pub use naming::BackupName;
pub use service::{
    BackupDownload, BackupFile, BackupService, BackupSettings, BackupStatus, CreatedBackup,
    DatabaseInfo, RestoreOutcome,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("database file not found at {}", .0.display())]
    DatabaseNotFound(PathBuf),
    #[error("backup file not found: {0}")]
    BackupNotFound(String),
    #[error("filename is required")]
    MissingFilename,
    #[error("invalid backup filename: {0}")]
    InvalidFilename(String),
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("{} is not a usable database: {reason}", .path.display())]
    InvalidBackup { path: PathBuf, reason: String },
    #[error("backup I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
