mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;
use ventas_api::auth::consts as perm;

use common::{read_json, TestApp};

#[tokio::test]
async fn business_routes_require_a_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/quotes", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;

    let status = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(status.status(), StatusCode::OK);

    let health = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn permissions_gate_each_route_group() {
    let app = TestApp::new().await;
    let reader = app.token_with(&[perm::QUOTES_READ]);

    let list = app
        .request(Method::GET, "/api/v1/quotes", None, Some(&reader))
        .await;
    assert_eq!(list.status(), StatusCode::OK);

    let create = app
        .request(
            Method::POST,
            "/api/v1/quotes",
            Some(json!({ "client": { "name": "Mostrador" }, "items": [] })),
            Some(&reader),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);

    let orders = app
        .request(Method::GET, "/api/v1/orders", None, Some(&reader))
        .await;
    assert_eq!(orders.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quote_to_delivery_note_over_http() {
    let app = TestApp::new().await;
    let client = app
        .seed_client("Constructora del Valle", Some("compras@delvalle.test"))
        .await;
    let product = app.seed_product("Cemento gris 50kg", dec!(100), 50).await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/quotes",
            Some(json!({
                "client_id": client.id,
                "items": [{ "product_id": product.id, "quantity": 3 }],
                "observations": "Entrega en obra"
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "activa");
    let quote_id = body["data"]["id"].as_str().unwrap().to_string();

    let remission = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/quotes/{}/remission", quote_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(remission.status(), StatusCode::CREATED);
    let body = read_json(remission).await;
    assert_eq!(body["data"]["quote"]["status"], "remisionado");
    assert_eq!(body["data"]["order"]["status"], "entregado");
    assert_eq!(body["data"]["order"]["order_number"], "PED-00001");
    assert_eq!(body["data"]["delivery_note"]["number"], "REM-00001");
    let note_id = body["data"]["delivery_note"]["id"].as_str().unwrap().to_string();
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let note = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/delivery-notes/{}", note_id),
            None,
        )
        .await;
    assert_eq!(note.status(), StatusCode::OK);
    let body = read_json(note).await;
    assert_eq!(body["data"]["client"]["name"], "Constructora del Valle");
    assert_eq!(body["data"]["total_quantity"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    // The order already has its note: 200 instead of 201
    let again = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{}/delivery-note", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(again.status(), StatusCode::OK);
    let body = read_json(again).await;
    assert_eq!(body["data"]["created"], false);
    assert_eq!(body["data"]["delivery_note"]["id"], note_id.as_str());

    let second = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/quotes/{}/remission", quote_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn errors_use_the_shared_body() {
    let app = TestApp::new().await;

    let missing = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body = read_json(missing).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"].as_str().unwrap().contains("not found"));
    assert!(body["timestamp"].is_string());

    let by_number = app
        .request_authenticated(Method::GET, "/api/v1/orders/by-number/PED-99999", None)
        .await;
    assert_eq!(by_number.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stock_shortage_is_unprocessable_with_details() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena fina m3", dec!(350), 5).await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product.id, "quantity": 10 }] })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let order_id = read_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let delivered = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{}/deliver", order_id),
            None,
        )
        .await;
    assert_eq!(delivered.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(delivered).await;
    assert_eq!(body["details"]["available"], 5);
    assert_eq!(body["details"]["requested"], 10);

    let scheduled = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{}/delivery-note", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(scheduled.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/status")
        .header("x-request-id", "flow-test-1")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "flow-test-1"
    );

    let generated = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert!(generated.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn sending_without_recipient_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Block 15x20x40", dec!(12), 100).await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/quotes",
            Some(json!({
                "client": { "name": "Mostrador" },
                "items": [{ "product_id": product.id, "quantity": 10 }]
            })),
        )
        .await;
    let quote_id = read_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let no_recipient = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/quotes/{}/send", quote_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(no_recipient.status(), StatusCode::BAD_REQUEST);

    let explicit = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/quotes/{}/send", quote_id),
            Some(json!({ "to": "compras@mostrador.test" })),
        )
        .await;
    assert_eq!(explicit.status(), StatusCode::OK);
    let body = read_json(explicit).await;
    assert_eq!(body["data"]["to"], "compras@mostrador.test");
    assert_eq!(body["data"]["with_attachment"], false);
}
