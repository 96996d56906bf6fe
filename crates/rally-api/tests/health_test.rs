//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_reports_readiness(pool: PgPool) {
    let (app, engine) = common::build_test_app(pool);

    let (status, before) = common::get_json(app.clone(), "/health").await;
    engine.startup().await;
    let (_, after) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["status"], "ok");
    assert!(before["version"].is_string());
    assert_eq!(before["ready"], false);
    assert_eq!(after["ready"], true);
    assert!(before["startup"].is_null());
    assert_eq!(after["startup"]["resumed"], serde_json::json!([]));
    assert_eq!(after["startup"]["discarded"], serde_json::json!([]));
    assert_eq!(after["startup"]["failed"], serde_json::json!([]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_route_returns_404(pool: PgPool) {
    let (app, _) = common::build_test_app(pool);

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
