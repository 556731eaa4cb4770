use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{require_text, AppState};
use crate::domain::{Attachment, NewAttachment};
use crate::error::AppError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Accepts both the snake_case and camelCase spellings the frontend uses.
#[derive(Debug, Deserialize)]
pub struct CreateAttachmentRequest {
    pub name: Option<String>,
    #[serde(alias = "filePath")]
    pub file_path: Option<String>,
    #[serde(alias = "contentType")]
    pub content_type: Option<String>,
    pub size: Option<u64>,
    #[serde(alias = "recordId")]
    pub record_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub success: bool,
    pub attachment: Attachment,
}

#[derive(Debug, Serialize)]
pub struct AttachmentListResponse {
    pub success: bool,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub async fn create_attachment(
    State(state): State<AppState>,
    payload: Result<Json<CreateAttachmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttachmentResponse>), AppError> {
    let Json(request) = payload?;

    let size = i64::try_from(request.size.unwrap_or(0))
        .map_err(|_| AppError::BadRequest("size is too large".into()))?;
    let content_type = request
        .content_type
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let attachment = Attachment::new(NewAttachment {
        name: require_text("name", request.name)?,
        file_path: require_text("file_path", request.file_path)?,
        content_type,
        size,
        record_id: request
            .record_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    });
    state.repo.insert_attachment(&attachment).await?;

    Ok((
        StatusCode::CREATED,
        Json(AttachmentResponse {
            success: true,
            attachment,
        }),
    ))
}

pub async fn get_attachment(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttachmentResponse>, AppError> {
    let attachment = state
        .repo
        .get_attachment(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".into()))?;

    Ok(Json(AttachmentResponse {
        success: true,
        attachment,
    }))
}

pub async fn list_record_attachments(
    Path(record_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttachmentListResponse>, AppError> {
    if state.repo.get_record(&record_id).await?.is_none() {
        return Err(AppError::NotFound("Record not found".into()));
    }
    let attachments = state.repo.list_attachments_for_record(&record_id).await?;

    Ok(Json(AttachmentListResponse {
        success: true,
        attachments,
    }))
}

pub async fn delete_attachment(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.repo.delete_attachment(&id).await? {
        return Err(AppError::NotFound("Attachment not found".into()));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Attachment deleted successfully".to_string(),
    }))
}
