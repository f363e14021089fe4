//! Mock Termgame Seller API served on a local port

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const API_KEY: &str = "integration-test-key";

/// What the mock vendor saw
#[derive(Default)]
pub struct MockVendor {
    pub status_calls: AtomicU32,
    pub last_buy_body: Mutex<Option<Value>>,
    pub last_headers: Mutex<Option<HeaderMap>>,
}

impl MockVendor {
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(API_KEY) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"statusCode": 401, "message": "Invalid API key"})),
        )
            .into_response()),
    }
}

async fn balance(State(vendor): State<Arc<MockVendor>>, headers: HeaderMap) -> Response {
    *vendor.last_headers.lock() = Some(headers.clone());
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    Json(json!({"balance": 1234.5})).into_response()
}

async fn products(headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    Json(json!([
        {
            "id": 1,
            "name": "Free Fire",
            "isActive": true,
            "playerFieldName": "Player ID",
            "packages": [
                {"id": "ff-100", "name": "100 Diamonds", "price": 35, "isActive": true},
                {"id": "ff-310", "name": "310 Diamonds", "price": "99.00", "isActive": false}
            ],
            "servers": []
        },
        {"id": 2, "name": "ROV", "isActive": false, "packages": [], "servers": []},
        {"id": 3, "name": "Genshin Impact", "isActive": true, "packages": [], "servers": []}
    ]))
    .into_response()
}

async fn orders(headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    Json(json!([
        {"orderId": "tx-1", "status": "SUCCESS", "paid": 100},
        {"id": 77, "status": "PENDING"}
    ]))
    .into_response()
}

async fn order_status(
    State(vendor): State<Arc<MockVendor>>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    vendor.status_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }

    match order_id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({"statusCode": 404, "message": "Order not found"})),
        )
            .into_response(),
        "no-message" => (StatusCode::BAD_REQUEST, Json(json!({}))).into_response(),
        "html" => (StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>").into_response(),
        "garbled" => (StatusCode::OK, "orderId=garbled").into_response(),
        "down" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "Maintenance"})),
        )
            .into_response(),
        id => Json(json!({
            "orderId": id,
            "status": "SUCCESS",
            "paid": 100,
            "beforeBalance": 1334.5,
            "afterBalance": 1234.5,
            "playerId": "123456789",
            "package": {
                "id": "ff-100",
                "name": "100 Diamonds",
                "price": 35,
                "product": {"name": "Free Fire"}
            }
        }))
        .into_response(),
    }
}

async fn buy(
    State(vendor): State<Arc<MockVendor>>,
    Path(package_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    *vendor.last_buy_body.lock() = Some(body);

    if package_id == "sold-out" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": ["package is not active", "insufficient stock"]})),
        )
            .into_response();
    }
    Json(json!({"orderId": "ord-1", "status": "PENDING"})).into_response()
}

/// Start the mock vendor; returns its base URL and recorded state
pub async fn spawn_vendor() -> (String, Arc<MockVendor>) {
    let vendor = Arc::new(MockVendor::default());
    let app = Router::new()
        .route("/v1/api/balance", get(balance))
        .route("/v1/api/products", get(products))
        .route("/v1/api/orders", get(orders))
        .route("/v1/api/order-status/:order_id", get(order_status))
        .route("/v1/api/buy/:package_id", post(buy))
        .with_state(vendor.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1/api", addr), vendor)
}
