use axum::http::StatusCode;
use pharmacy_admin::api::{self, AppState};
use pharmacy_admin::config::Config;
use pharmacy_admin::db::init_db;
use pharmacy_admin::Repository;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("app.db");
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool, db_path.clone()));

    let config = Config::from_env_map(HashMap::from([(
        "DATABASE_PATH".to_string(),
        db_path.to_string_lossy().to_string(),
    )]))
    .unwrap();

    (api::create_router(AppState::new(repo, config)), temp_dir)
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn notify(app: &axum::Router, body: Value) -> Value {
    let (status, json) = request(app, "POST", "/api/notifications", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", json);
    json["notification"].clone()
}

#[tokio::test]
async fn test_create_notification_defaults() {
    let (app, _temp) = setup_test_app().await;

    let n = notify(
        &app,
        json!({ "title": "Inspection due", "message": "Visit Nahdi", "user_id": "u1" }),
    )
    .await;

    assert_eq!(n["type"], "info");
    assert_eq!(n["userId"], "u1");
    assert_eq!(n["isRead"], false);
    assert!(n["recordId"].is_null());
    for key in ["id", "title", "message", "createdAt", "updatedAt"] {
        assert!(n.get(key).is_some(), "missing key {}", key);
    }
}

#[tokio::test]
async fn test_list_requires_user_id() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = request(&app, "GET", "/api/notifications", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "user_id is required");

    let (status, _) = request(&app, "GET", "/api/notifications?user_id=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_mark_read_and_unread_filter() {
    let (app, _temp) = setup_test_app().await;
    let first = notify(
        &app,
        json!({ "title": "A", "message": "a", "type": "warning", "user_id": "u1" }),
    )
    .await;
    notify(&app, json!({ "title": "B", "message": "b", "user_id": "u1" })).await;
    notify(&app, json!({ "title": "C", "message": "c", "user_id": "u2" })).await;

    let (status, body) = request(&app, "GET", "/api/notifications?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notifications"].as_array().unwrap().len(), 2);

    let id = first["id"].as_str().unwrap();
    let uri = format!("/api/notifications/{}/read", id);
    let (status, body) = request(&app, "PUT", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notification"]["isRead"], true);
    assert_eq!(body["notification"]["type"], "warning");

    let (_, body) = request(
        &app,
        "GET",
        "/api/notifications?user_id=u1&unread_only=true",
        None,
    )
    .await;
    let unread = body["notifications"].as_array().unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["title"], "B");

    let (status, _) = request(&app, "PUT", "/api/notifications/missing/read", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_record_reference_rules() {
    let (app, _temp) = setup_test_app().await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/notifications",
        Some(json!({ "title": "T", "message": "m", "user_id": "u1", "record_id": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = request(
        &app,
        "POST",
        "/api/records",
        Some(json!({ "serial_number": "2024-00001" })),
    )
    .await;
    let record_id = created["record"]["id"].as_str().unwrap().to_string();

    let n = notify(
        &app,
        json!({ "title": "T", "message": "m", "user_id": "u1", "record_id": record_id }),
    )
    .await;
    assert_eq!(n["recordId"], record_id.as_str());

    let (status, _) = request(&app, "DELETE", &format!("/api/records/{}", record_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, "GET", "/api/notifications?user_id=u1", None).await;
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["id"], n["id"]);
    assert!(notifications[0]["recordId"].is_null());
}

#[tokio::test]
async fn test_create_requires_fields() {
    let (app, _temp) = setup_test_app().await;

    for body in [
        json!({ "message": "m", "user_id": "u1" }),
        json!({ "title": "T", "user_id": "u1" }),
        json!({ "title": "T", "message": "m", "user_id": "  " }),
    ] {
        let (status, json) = request(&app, "POST", "/api/notifications", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }
}
