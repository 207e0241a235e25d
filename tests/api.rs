//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tableside::api::{build_router, ApiState};
use tableside::db::OrderRepo;
use tableside::ordering::{CartLine, OrderDraft};
use tableside::{DbPool, SessionConfig};
use tower::ServiceExt;

mod common;
use common::{idle_services, seeded_db, setup_test_db};

const API_KEY: &str = "test-api-key";

/// Build a test API router
fn build_test_router(db: DbPool, api_key: Option<&str>) -> axum::Router {
    let services = idle_services(&db);
    let state = ApiState::new(
        db,
        api_key.map(ToString::to_string),
        services,
        SessionConfig::default(),
    );
    build_router(Arc::new(state), None)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {API_KEY}"))
        .header("Content-Type", "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(setup_test_db(), Some(API_KEY));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_reports_empty_menu() {
    let app = build_test_router(setup_test_db(), Some(API_KEY));

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["menu"]["status"], "empty");
}

#[tokio::test]
async fn test_menu_requires_auth() {
    let app = build_test_router(seeded_db(), Some(API_KEY));

    let response = app
        .oneshot(Request::builder().uri("/api/menu").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "missing_api_key");
}

#[tokio::test]
async fn test_menu_rejects_wrong_key() {
    let app = build_test_router(seeded_db(), Some(API_KEY));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/menu")
                .header("Authorization", "Bearer another-till")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_api_key");
}

#[tokio::test]
async fn test_kitchen_key_header_is_accepted() {
    let app = build_test_router(seeded_db(), Some(API_KEY));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/orders")
                .header("X-Kitchen-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_menu_open_without_configured_key() {
    let app = build_test_router(seeded_db(), None);

    let response = app
        .oneshot(Request::builder().uri("/api/menu").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_menu_lists_unavailable_items() {
    let app = build_test_router(seeded_db(), Some(API_KEY));

    let response = app
        .oneshot(authed("GET", "/api/menu", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 4);

    let coffee = items.iter().find(|i| i["dish_id"] == "d4").unwrap();
    assert_eq!(coffee["available"], false);
    assert_eq!(coffee["quantity"], 0);
}

#[tokio::test]
async fn test_set_quantity_restocks_dish() {
    let db = seeded_db();
    let app = build_test_router(db.clone(), Some(API_KEY));

    let response = app
        .oneshot(authed(
            "PATCH",
            "/api/menu/d4/quantity",
            Body::from(r#"{"quantity": 12}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["quantity"], 12);
    assert_eq!(json["available"], true);

    let stored = tableside::db::MenuRepo::new(db).get("d4").unwrap().unwrap();
    assert!(stored.available);
}

#[tokio::test]
async fn test_set_quantity_unknown_dish() {
    let app = build_test_router(seeded_db(), Some(API_KEY));

    let response = app
        .oneshot(authed(
            "PATCH",
            "/api/menu/nope/quantity",
            Body::from(r#"{"quantity": 1}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_orders_endpoints() {
    let db = seeded_db();
    let orders = OrderRepo::new(db.clone());
    let order = orders
        .commit_blocking(&OrderDraft {
            table_number: "4".to_string(),
            lines: vec![CartLine {
                dish_id: "d3".to_string(),
                name: "Masala Dosa".to_string(),
                unit_price: 80.0,
                quantity: 2,
            }],
            total: 160.0,
        })
        .unwrap();

    let app = build_test_router(db, Some(API_KEY));

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/orders?limit=5", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["table_number"], "4");
    assert_eq!(json[0]["status"], "confirmed");

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/api/orders/{}", order.id), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["lines"][0]["name"], "Masala Dosa");
    assert_eq!(json["lines"][0]["quantity"], 2);

    let response = app
        .oneshot(authed("GET", "/api/orders/9999", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
