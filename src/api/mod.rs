pub mod attachments;
pub mod backup;
pub mod health;
pub mod notifications;
pub mod records;

use crate::backup::BackupService;
use crate::config::Config;
use crate::db::Repository;
use crate::error::AppError;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub backups: Arc<BackupService>,
}

impl AppState {
    /// Build the state with a backup service bound to `repo`.
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let backups = BackupService::new((&config).into()).with_repository(repo.clone());
        Self {
            repo,
            config,
            backups: Arc::new(backups),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/backup", post(backup::create_backup))
        .route("/backup/download/:filename", get(backup::download_backup))
        .route("/backup/restore", post(backup::restore_backup))
        .route("/backup/status", get(backup::backup_status))
        .route(
            "/records",
            get(records::list_records).post(records::create_record),
        )
        .route("/records/search", get(records::search_records))
        .route(
            "/records/:id",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route(
            "/records/:id/attachments",
            get(attachments::list_record_attachments),
        )
        .route("/attachments", post(attachments::create_attachment))
        .route(
            "/attachments/:id",
            get(attachments::get_attachment).delete(attachments::delete_attachment),
        )
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/:id/read",
            put(notifications::mark_notification_read),
        )
}

/// Reject a missing or blank required text field.
pub(crate) fn require_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}
