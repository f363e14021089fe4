//! Axum router for the webhook receiver
//!
//! # Endpoints
//!
//! - `<path>` (default `/webhook`): vendor deliveries. Every method is routed
//!   here so non-POST requests get the pipeline's 405 body.
//! - `GET /health`: liveness probe

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use super::pipeline::{WebhookOutcome, WebhookPipeline};

impl IntoResponse for WebhookOutcome {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Create the webhook router with deliveries accepted on `path`
pub fn webhook_router(pipeline: Arc<WebhookPipeline>, path: &str) -> Router {
    Router::new()
        .route(path, any(webhook_handler))
        .route("/health", get(webhook_health))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Delivery handler
pub async fn webhook_handler(
    State(pipeline): State<Arc<WebhookPipeline>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let request = pipeline.request_from_parts(method, &headers, body, peer);
    pipeline.handle(request).await.into_response()
}

/// Health check endpoint
pub async fn webhook_health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "termgame-seller-webhook"
        })),
    )
}

/// Bind `addr` and serve `router` until Ctrl-C
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Webhook receiver listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
