use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!("Duplicate value: {}", db_err.message()));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::BadRequest("Referenced record does not exist".to_string());
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return AppError::NotFound("Row not found".to_string());
        }
        AppError::Internal(err.to_string())
    }
}

impl From<crate::backup::BackupError> for AppError {
    fn from(err: crate::backup::BackupError) -> Self {
        use crate::backup::BackupError;

        match err {
            BackupError::DatabaseNotFound(path) => AppError::NotFound(format!(
                "Database file not found at: {}",
                path.display()
            )),
            BackupError::BackupNotFound(_) => AppError::NotFound("Backup file not found".into()),
            BackupError::MissingFilename => AppError::BadRequest("Filename is required".into()),
            BackupError::InvalidFilename(name) => {
                AppError::BadRequest(format!("Invalid backup filename: {}", name))
            }
            invalid @ BackupError::InvalidBackup { .. } => {
                warn!(error = %invalid, "Rejected restore");
                AppError::BadRequest("Backup file is not a valid database".into())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
