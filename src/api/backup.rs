use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::AppState;
use crate::backup::{BackupFile, DatabaseInfo};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct CreateBackupResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub message: String,
    pub current_backup: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub database: Option<DatabaseDto>,
    pub backups: Vec<BackupDto>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseDto {
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct BackupDto {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub download_url: String,
}

impl From<DatabaseInfo> for DatabaseDto {
    fn from(info: DatabaseInfo) -> Self {
        Self {
            size: info.size,
            modified: info.modified,
            path: info.path,
        }
    }
}

impl From<BackupFile> for BackupDto {
    fn from(file: BackupFile) -> Self {
        Self {
            filename: file.filename,
            size: file.size,
            created: file.created,
            download_url: file.download_url,
        }
    }
}

pub async fn create_backup(
    State(state): State<AppState>,
) -> Result<Json<CreateBackupResponse>, AppError> {
    let created = state.backups.create_backup().await?;

    Ok(Json(CreateBackupResponse {
        success: true,
        message: "Backup created successfully".to_string(),
        filename: created.filename,
        path: created.path,
        size: created.size,
        checksum: created.checksum,
    }))
}

pub async fn download_backup(
    Path(filename): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let download = state.backups.download_backup(&filename).await?;

    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

/// A missing or unparseable body is treated like a missing filename.
pub async fn restore_backup(
    State(state): State<AppState>,
    payload: Result<Json<RestoreRequest>, JsonRejection>,
) -> Result<Json<RestoreResponse>, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let filename = request.filename.unwrap_or_default();

    let outcome = state.backups.restore_backup(&filename).await?;

    Ok(Json(RestoreResponse {
        success: true,
        message: "Database restored successfully".to_string(),
        current_backup: outcome.safety_copy,
    }))
}

pub async fn backup_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.backups.status().await?;

    Ok(Json(StatusResponse {
        success: true,
        database: status.database.map(DatabaseDto::from),
        backups: status.backups.into_iter().map(BackupDto::from).collect(),
    }))
}
