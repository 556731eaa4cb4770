use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{require_text, AppState};
use crate::domain::{NewNotification, Notification};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub user_id: Option<String>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    #[serde(alias = "recordId")]
    pub record_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub success: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub notification: Notification,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    query: Result<Query<NotificationsQuery>, QueryRejection>,
) -> Result<Json<NotificationListResponse>, AppError> {
    let Query(params) = query?;
    let user_id = require_text("user_id", params.user_id)?;

    let notifications = state
        .repo
        .list_notifications_for_user(&user_id, params.unread_only.unwrap_or(false))
        .await?;

    Ok(Json(NotificationListResponse {
        success: true,
        notifications,
    }))
}

pub async fn create_notification(
    State(state): State<AppState>,
    payload: Result<Json<CreateNotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    let Json(request) = payload?;

    let notification = Notification::new(NewNotification {
        title: require_text("title", request.title)?,
        message: require_text("message", request.message)?,
        kind: request.kind,
        user_id: require_text("user_id", request.user_id)?,
        record_id: request
            .record_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    });
    state.repo.insert_notification(&notification).await?;

    Ok((
        StatusCode::CREATED,
        Json(NotificationResponse {
            success: true,
            notification,
        }),
    ))
}

pub async fn mark_notification_read(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NotificationResponse>, AppError> {
    let notification = state
        .repo
        .mark_notification_read(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".into()))?;

    Ok(Json(NotificationResponse {
        success: true,
        notification,
    }))
}
