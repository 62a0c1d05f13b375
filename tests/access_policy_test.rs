use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use returns_backend::config::AppConfig;
use returns_backend::entities::{prelude::*, users};
use returns_backend::infrastructure::database;
use returns_backend::services::return_service::ReturnService;
use returns_backend::services::storage::{LocalStorage, StorageService};
use returns_backend::utils::hash::hash_password;
use returns_backend::{AppState, create_app};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn setup_app() -> (Router, DatabaseConnection, tempfile::TempDir) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn StorageService> = Arc::new(LocalStorage::new(dir.path()));
    let returns = Arc::new(ReturnService::new(db.clone(), storage.clone()));

    let state = AppState {
        db: db.clone(),
        storage,
        returns,
        config: AppConfig::development(),
    };

    (create_app(state), db, dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, username: &str, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(format!(
                    r#"{{"username": "{}", "password": "password123", "email": "{}"}}"#,
                    username, email
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["access"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn staff_token(app: &Router, db: &DatabaseConnection) -> String {
    users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set("reviewer".to_string()),
        password_hash: Set(hash_password("staffpass123").unwrap()),
        email: Set(None),
        first_name: Set(None),
        last_name: Set(None),
        is_staff: Set(true),
        is_superuser: Set(false),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"username": "reviewer", "password": "staffpass123"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access"]
        .as_str()
        .unwrap()
        .to_string()
}

const BOUNDARY: &str = "---------------------------77fd3a9c41b0";

async fn create_return(app: &Router, token: &str, barcode: &str) -> String {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"barcode\"\r\n\r\n{barcode}\r\n--{BOUNDARY}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/return-requests")
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn get(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn list_barcodes(app: &Router, uri: &str, token: &str) -> Vec<String> {
    let response = get(app, uri, token).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["barcode"].as_str().unwrap().to_string())
        .collect()
}

async fn patch_status(
    app: &Router,
    id: &str,
    token: &str,
    body: &str,
) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/return-requests/{}/update_status", id))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_non_staff_sees_only_own_requests() {
    let (app, _db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let bob = register(&app, "bob", "bob@shop.example").await;

    create_return(&app, &alice, "ABC123").await;
    let bob_id = create_return(&app, &bob, "XYZ789").await;

    let barcodes = list_barcodes(&app, "/return-requests", &alice).await;
    assert_eq!(barcodes, vec!["ABC123"]);

    // The search parameter does not widen a non-staff caller's scope
    let barcodes = list_barcodes(&app, "/return-requests?search=XYZ", &alice).await;
    assert_eq!(barcodes, vec!["ABC123"]);

    // Someone else's id looks exactly like a missing one
    let response = get(&app, &format!("/return-requests/{}", bob_id), &alice).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/return-requests/{}", bob_id), &bob).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_staff_list_and_search() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let bob = register(&app, "bob", "bob@shop.example").await;
    let staff = staff_token(&app, &db).await;

    create_return(&app, &alice, "ABC123").await;
    create_return(&app, &bob, "XYZ789").await;

    // Staff see everything, newest first
    let barcodes = list_barcodes(&app, "/return-requests", &staff).await;
    assert_eq!(barcodes, vec!["XYZ789", "ABC123"]);

    // Case-insensitive match against the barcode
    let barcodes = list_barcodes(&app, "/return-requests?search=abc", &staff).await;
    assert_eq!(barcodes, vec!["ABC123"]);

    // ... the owner's username
    let barcodes = list_barcodes(&app, "/return-requests?search=BOB", &staff).await;
    assert_eq!(barcodes, vec!["XYZ789"]);

    // ... or the owner's email
    let barcodes = list_barcodes(&app, "/return-requests?search=shop.example", &staff).await;
    assert_eq!(barcodes, vec!["XYZ789"]);

    // No match, empty set; empty term, the full set
    let barcodes = list_barcodes(&app, "/return-requests?search=nomatch", &staff).await;
    assert!(barcodes.is_empty());

    // LIKE wildcards in the term are matched literally ("100%" is not
    // everything, "_BC" is not "ABC")
    let barcodes = list_barcodes(&app, "/return-requests?search=100%25", &staff).await;
    assert!(barcodes.is_empty());
    let barcodes = list_barcodes(&app, "/return-requests?search=_BC", &staff).await;
    assert!(barcodes.is_empty());
    let barcodes = list_barcodes(&app, "/return-requests?search=", &staff).await;
    assert_eq!(barcodes.len(), 2);

    // Staff can read any record directly
    let alice_row = ReturnRequests::find().all(&db).await.unwrap();
    let any_id = &alice_row[0].id;
    let response = get(&app, &format!("/return-requests/{}", any_id), &staff).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_search_matches_literal_wildcard_characters() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let staff = staff_token(&app, &db).await;

    create_return(&app, &alice, "SALE-50%").await;
    create_return(&app, &alice, "SALE-500").await;

    let barcodes = list_barcodes(&app, "/return-requests?search=50%25", &staff).await;
    assert_eq!(barcodes, vec!["SALE-50%"]);
}

#[tokio::test]
async fn test_non_staff_cannot_transition_status() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let id = create_return(&app, &alice, "ABC123").await;

    // Even the owner cannot transition their own request
    let response = patch_status(&app, &id, &alice, r#"{"status": "approved"}"#).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let row = ReturnRequests::find_by_id(&id).one(&db).await.unwrap().unwrap();
    assert_eq!(
        row.status,
        returns_backend::entities::return_requests::ReturnStatus::Pending
    );
}

#[tokio::test]
async fn test_invalid_status_leaves_record_untouched() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let staff = staff_token(&app, &db).await;
    let id = create_return(&app, &alice, "ABC123").await;

    let response = patch_status(
        &app,
        &id,
        &staff,
        r#"{"status": "archived", "admin_notes": "should not stick"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body_json(response).await;
    assert!(errors["errors"]["status"][0]
        .as_str()
        .unwrap()
        .contains("archived"));

    let row = ReturnRequests::find_by_id(&id).one(&db).await.unwrap().unwrap();
    assert_eq!(
        row.status,
        returns_backend::entities::return_requests::ReturnStatus::Pending
    );
    assert_eq!(row.admin_notes, None);
}

#[tokio::test]
async fn test_status_transition_note_semantics() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let staff = staff_token(&app, &db).await;
    let id = create_return(&app, &alice, "ABC123").await;

    let response = patch_status(
        &app,
        &id,
        &staff,
        r#"{"status": "rejected", "admin_notes": "damaged in transit"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Omitting the note keeps the stored one
    let response = patch_status(&app, &id, &staff, r#"{"status": "approved"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "approved");
    assert_eq!(updated["admin_notes"], "damaged in transit");

    // An explicit empty string clears it
    let response = patch_status(
        &app,
        &id,
        &staff,
        r#"{"status": "approved", "admin_notes": ""}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["admin_notes"], Value::Null);
}

#[tokio::test]
async fn test_unknown_id_and_statistics_scope() {
    let (app, db, _dir) = setup_app().await;
    let alice = register(&app, "alice", "alice@example.com").await;
    let bob = register(&app, "bob", "bob@shop.example").await;
    let staff = staff_token(&app, &db).await;

    let response = patch_status(
        &app,
        "no-such-id",
        &staff,
        r#"{"status": "approved"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    create_return(&app, &alice, "A-1").await;
    create_return(&app, &alice, "A-2").await;
    let bob_id = create_return(&app, &bob, "B-1").await;

    let response = patch_status(&app, &bob_id, &staff, r#"{"status": "rejected"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Statistics cover every user's requests, not just one caller's
    let response = get(&app, "/return-requests/statistics", &staff).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_requests"], 3);
    assert_eq!(stats["pending"], 2);
    assert_eq!(stats["rejected"], 1);
    assert_eq!(stats["approved"], 0);
    assert_eq!(
        stats["total_requests"].as_i64().unwrap(),
        stats["pending"].as_i64().unwrap()
            + stats["approved"].as_i64().unwrap()
            + stats["rejected"].as_i64().unwrap()
    );

    // Non-staff callers never reach the aggregate
    let response = get(&app, "/return-requests/statistics", &bob).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
