//! Webhook processing pipeline
//!
//! One inbound delivery runs through these stages in order, stopping at the
//! first rejection:
//!
//! 1. method check (POST only)
//! 2. sender allowlist
//! 3. User-Agent check
//! 4. `x-hash` check
//! 5. body parse (JSON object with a non-empty string `id`)
//! 6. rate limit
//! 7. in-flight dedup
//! 8. order status lookup with retry
//! 9. side effects (best effort)
//! 10. response
//!
//! Every stage writes to the [`WebhookEventLog`] when it passes; a rejection
//! writes one record carrying the status code from
//! [`WebhookError::status_code`]. The response only carries its public message.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};

use super::event_log::WebhookEventLog;
use super::hooks::OrderSideEffect;
use super::inflight::InFlightTracker;
use super::ip_filter::{resolve_client_ip, IpFilter};
use super::rate_limit::RateLimiter;
use super::retry::RetryExecutor;
use super::signature::SignatureVerifier;
use crate::client::{OrderStatus, OrderStatusSource};
use crate::config::{RateLimitKey, SellerConfig, WebhookConfig};
use crate::error::{WebhookError, WebhookResult};

/// Header carrying the signature digest
pub const SIGNATURE_HEADER: &str = "x-hash";

/// One inbound delivery
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// HTTP method
    pub method: Method,
    /// `User-Agent` header
    pub user_agent: Option<String>,
    /// `x-hash` header
    pub signature: Option<String>,
    /// Raw body
    pub body: Bytes,
    /// Resolved sender address, see [`resolve_client_ip`]
    pub client_ip: Option<IpAddr>,
}

impl WebhookRequest {
    /// Build from raw HTTP parts. `X-Forwarded-For` is honoured only when
    /// `peer` is one of `trusted_proxies`.
    pub fn from_parts(
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        peer: Option<SocketAddr>,
        trusted_proxies: &[IpAddr],
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            method,
            user_agent: header(http::header::USER_AGENT.as_str()),
            signature: header(SIGNATURE_HEADER),
            body,
            client_ip: resolve_client_ip(headers, peer, trusted_proxies),
        }
    }

    /// Sender address for logs and rate limiting, `"unknown"` when absent
    pub fn client_ip_label(&self) -> String {
        self.client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Status code and JSON body to send back
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body
    pub body: Value,
}

impl WebhookOutcome {
    fn processed(transaction_id: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({
                "success": true,
                "message": "Webhook received and processed",
                "transaction_id": transaction_id,
                "processed_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            }),
        }
    }

    fn in_progress(transaction_id: &str) -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            body: json!({
                "success": true,
                "message": "Webhook already in progress",
                "transaction_id": transaction_id,
            }),
        }
    }

    fn rejected(err: &WebhookError) -> Self {
        Self {
            status: StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: json!({
                "success": false,
                "error": err.public_message(),
            }),
        }
    }

    /// Whether the delivery was accepted (processed or already in progress)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Validates, authenticates and processes webhook deliveries
pub struct WebhookPipeline {
    ip_filter: IpFilter,
    trusted_proxies: Vec<IpAddr>,
    verifier: SignatureVerifier,
    limiter: RateLimiter,
    rate_limit_key: RateLimitKey,
    retry: RetryExecutor,
    source: Arc<dyn OrderStatusSource>,
    side_effects: Vec<Arc<dyn OrderSideEffect>>,
    event_log: Arc<WebhookEventLog>,
    inflight: InFlightTracker,
}

impl std::fmt::Debug for WebhookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPipeline")
            .field("ip_filter", &self.ip_filter)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("verifier", &self.verifier)
            .field("limiter", &self.limiter)
            .field("rate_limit_key", &self.rate_limit_key)
            .field("retry", &self.retry)
            .field("side_effects", &self.side_effects.len())
            .finish_non_exhaustive()
    }
}

impl WebhookPipeline {
    /// Pipeline for `config`, authenticating against `api_key` and looking up
    /// orders through `source`
    pub fn new(config: &WebhookConfig, api_key: &str, source: Arc<dyn OrderStatusSource>) -> Self {
        Self {
            ip_filter: IpFilter::new(config.allowed_ips.clone()),
            trusted_proxies: config.trusted_proxies.clone(),
            verifier: SignatureVerifier::new(api_key, config.user_agent.clone()),
            limiter: RateLimiter::from_config(&config.rate_limit),
            rate_limit_key: config.rate_limit.key,
            retry: RetryExecutor::from_config(&config.retry),
            source,
            side_effects: Vec::new(),
            event_log: Arc::new(WebhookEventLog::new(
                config.log_file.clone(),
                config.logging_enabled,
            )),
            inflight: InFlightTracker::new(),
        }
    }

    /// Pipeline for a full configuration
    pub fn from_config(config: &SellerConfig, source: Arc<dyn OrderStatusSource>) -> Self {
        Self::new(&config.webhook, config.api.api_key(), source)
    }

    /// Add a side effect; hooks run in insertion order
    pub fn with_side_effect(mut self, hook: Arc<dyn OrderSideEffect>) -> Self {
        self.side_effects.push(hook);
        self
    }

    /// Replace the sender allowlist
    pub fn with_ip_filter(mut self, ip_filter: IpFilter) -> Self {
        self.ip_filter = ip_filter;
        self
    }

    /// Replace the rate limiter
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the retry executor
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the event log
    pub fn with_event_log(mut self, event_log: Arc<WebhookEventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    /// Deliveries currently being processed
    pub fn inflight(&self) -> &InFlightTracker {
        &self.inflight
    }

    /// Build a [`WebhookRequest`] using this pipeline's trusted proxies
    pub fn request_from_parts(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        peer: Option<SocketAddr>,
    ) -> WebhookRequest {
        WebhookRequest::from_parts(method, headers, body, peer, &self.trusted_proxies)
    }

    /// Process one delivery. Never fails; every error becomes a response.
    pub async fn handle(&self, request: WebhookRequest) -> WebhookOutcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.event_log
            .info(
                &request_id,
                "Webhook request started",
                json!({
                    "method": request.method.as_str(),
                    "ip_address": request.client_ip_label(),
                }),
            )
            .await;

        match self.process(&request_id, &request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.log_rejection(&request_id, &request, &err).await;
                WebhookOutcome::rejected(&err)
            }
        }
    }

    async fn process(
        &self,
        request_id: &str,
        request: &WebhookRequest,
    ) -> WebhookResult<WebhookOutcome> {
        if request.method != Method::POST {
            return Err(WebhookError::MethodNotAllowed);
        }

        if !self.ip_filter.is_allowed(request.client_ip) {
            return Err(WebhookError::IpNotAllowed);
        }

        self.verifier
            .check(request.user_agent.as_deref(), request.signature.as_deref())?;

        self.event_log
            .info(
                request_id,
                "Webhook authenticated",
                json!({
                    "ip_address": request.client_ip_label(),
                    "allowlist": self.ip_filter.is_enabled(),
                }),
            )
            .await;

        let transaction_id = parse_transaction_id(&request.body)?;

        self.event_log
            .info(
                request_id,
                "Webhook received",
                json!({
                    "transaction_id": transaction_id,
                    "raw_body": String::from_utf8_lossy(&request.body),
                    "ip_address": request.client_ip_label(),
                }),
            )
            .await;

        let identifier = match self.rate_limit_key {
            RateLimitKey::ClientIp => request.client_ip_label(),
            RateLimitKey::TransactionId => transaction_id.clone(),
        };
        let admitted = self
            .limiter
            .try_admit(&identifier)
            .await
            .map_err(|e| WebhookError::Internal(e.to_string()))?;
        if !admitted {
            return Err(WebhookError::RateLimited);
        }

        self.event_log
            .info(
                request_id,
                "Rate limit passed",
                json!({
                    "identifier": identifier,
                    "max_requests": self.limiter.max_requests(),
                }),
            )
            .await;

        let Some(_guard) = self.inflight.try_begin(&transaction_id) else {
            self.event_log
                .info(
                    request_id,
                    "Webhook already in progress",
                    json!({ "transaction_id": transaction_id }),
                )
                .await;
            return Ok(WebhookOutcome::in_progress(&transaction_id));
        };

        let status = self.fetch_status(request_id, &transaction_id).await?;

        self.event_log
            .info(
                request_id,
                "Transaction processed",
                json!({
                    "transaction_id": transaction_id,
                    "status": status.status.as_str(),
                    "order_details": serde_json::to_value(&status).unwrap_or(Value::Null),
                }),
            )
            .await;

        self.run_side_effects(request_id, &transaction_id, &status)
            .await;

        self.event_log
            .info(
                request_id,
                "Webhook response sent",
                json!({
                    "transaction_id": transaction_id,
                    "status_code": StatusCode::OK.as_u16(),
                }),
            )
            .await;

        Ok(WebhookOutcome::processed(&transaction_id))
    }

    async fn fetch_status(
        &self,
        request_id: &str,
        transaction_id: &str,
    ) -> WebhookResult<OrderStatus> {
        self.event_log
            .info(
                request_id,
                "Order status lookup started",
                json!({
                    "transaction_id": transaction_id,
                    "max_retries": self.retry.max_retries(),
                }),
            )
            .await;

        let source = &self.source;
        let event_log = &self.event_log;
        let mut attempts = 0;
        let result = self
            .retry
            .execute(|attempt| {
                attempts = attempt;
                async move {
                    let result = source.order_status(transaction_id).await;
                    if let Err(e) = &result {
                        event_log
                            .warning(
                                request_id,
                                "Order status lookup attempt failed",
                                json!({
                                    "transaction_id": transaction_id,
                                    "attempt": attempt,
                                    "retryable": e.is_retryable(),
                                    "error": e.to_string(),
                                }),
                            )
                            .await;
                    }
                    result
                }
            })
            .await;

        match result {
            Ok(status) => {
                self.event_log
                    .info(
                        request_id,
                        "Order status lookup finished",
                        json!({
                            "transaction_id": transaction_id,
                            "attempts": attempts,
                            "status": status.status.as_str(),
                        }),
                    )
                    .await;
                Ok(status)
            }
            Err(e) => {
                self.event_log
                    .warning(
                        request_id,
                        "Order status lookup failed",
                        json!({
                            "transaction_id": transaction_id,
                            "attempts": attempts,
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                Err(WebhookError::Upstream(e.to_string()))
            }
        }
    }

    async fn run_side_effects(&self, request_id: &str, transaction_id: &str, status: &OrderStatus) {
        let mut failed = 0;
        for hook in &self.side_effects {
            if let Err(e) = hook.on_order_status(transaction_id, status).await {
                failed += 1;
                self.event_log
                    .warning(
                        request_id,
                        "Side effect failed",
                        json!({
                            "hook": hook.name(),
                            "transaction_id": transaction_id,
                            "error": format!("{:#}", e),
                        }),
                    )
                    .await;
            }
        }

        self.event_log
            .info(
                request_id,
                "Side effects finished",
                json!({
                    "transaction_id": transaction_id,
                    "hooks": self.side_effects.len(),
                    "failed": failed,
                }),
            )
            .await;
    }

    async fn log_rejection(&self, request_id: &str, request: &WebhookRequest, err: &WebhookError) {
        let mut data = json!({
            "ip_address": request.client_ip_label(),
            "status_code": err.status_code(),
        });
        match err {
            WebhookError::MethodNotAllowed => {
                data["method"] = json!(request.method.as_str());
            }
            WebhookError::InvalidUserAgent => {
                data["user_agent"] = json!(request.user_agent);
            }
            // Only the received digest is logged, never the expected one
            WebhookError::InvalidSignature => {
                data["received_hash"] = json!(request.signature);
            }
            WebhookError::InvalidPayload(_) | WebhookError::MissingTransactionId => {
                data["raw_body"] = json!(String::from_utf8_lossy(&request.body));
            }
            WebhookError::Upstream(detail) | WebhookError::Internal(detail) => {
                data["error"] = json!(detail);
            }
            WebhookError::IpNotAllowed
            | WebhookError::MissingSignature
            | WebhookError::RateLimited => {}
        }

        let message = err.to_string();
        if err.status_code() >= 500 {
            self.event_log
                .error(request_id, "Error processing webhook", data)
                .await;
        } else {
            if err.is_security_event() {
                data["security_event"] = json!(true);
            }
            self.event_log.warning(request_id, &message, data).await;
        }
    }
}

/// Extract the transaction id from a delivery body
fn parse_transaction_id(body: &[u8]) -> WebhookResult<String> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let object = payload
        .as_object()
        .ok_or_else(|| WebhookError::InvalidPayload("expected a JSON object".to_string()))?;

    match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(WebhookError::MissingTransactionId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WEBHOOK_USER_AGENT;
    use crate::error::{ApiError, ApiResult};
    use crate::webhook::signature::compute_signature;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const API_KEY: &str = "test-api-key-for-unit-tests";

    struct ScriptedSource {
        calls: AtomicU32,
        fail_with: Option<ApiError>,
    }

    impl ScriptedSource {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_with: None,
            })
        }

        fn failing(err: ApiError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_with: Some(err),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderStatusSource for ScriptedSource {
        async fn order_status(&self, order_id: &str) -> ApiResult<OrderStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(serde_json::from_value(json!({
                "orderId": order_id,
                "status": "SUCCESS",
                "paid": 100
            }))
            .unwrap())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl OrderSideEffect for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_order_status(&self, _: &str, _: &OrderStatus) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }
    }

    fn pipeline(source: Arc<ScriptedSource>) -> WebhookPipeline {
        let config = SellerConfig::test_config();
        WebhookPipeline::from_config(&config, source)
    }

    fn delivery(body: &str) -> WebhookRequest {
        WebhookRequest {
            method: Method::POST,
            user_agent: Some(WEBHOOK_USER_AGENT.to_string()),
            signature: Some(compute_signature(API_KEY)),
            body: Bytes::from(body.to_string()),
            client_ip: Some("203.0.113.7".parse().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_valid_delivery_processed() {
        let source = ScriptedSource::ok();
        let outcome = pipeline(source.clone()).handle(delivery(r#"{"id":"tx-1"}"#)).await;

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body["success"], true);
        assert_eq!(outcome.body["transaction_id"], "tx-1");
        assert_eq!(outcome.body["message"], "Webhook received and processed");
        assert!(outcome.body["processed_at"].is_string());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_post_rejected() {
        let mut request = delivery(r#"{"id":"tx-1"}"#);
        request.method = Method::GET;
        let outcome = pipeline(ScriptedSource::ok()).handle(request).await;

        assert_eq!(outcome.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(outcome.body["error"], "Method not allowed. Only POST is accepted.");
    }

    #[tokio::test]
    async fn test_auth_failures() {
        let p = pipeline(ScriptedSource::ok());

        let mut wrong_agent = delivery(r#"{"id":"tx-1"}"#);
        wrong_agent.user_agent = Some("Mozilla/5.0".into());
        assert_eq!(p.handle(wrong_agent).await.status, StatusCode::FORBIDDEN);

        let mut missing_hash = delivery(r#"{"id":"tx-1"}"#);
        missing_hash.signature = None;
        let outcome = p.handle(missing_hash).await;
        assert_eq!(outcome.status, StatusCode::UNAUTHORIZED);
        assert_eq!(outcome.body["error"], "Missing x-hash header");

        let mut wrong_hash = delivery(r#"{"id":"tx-1"}"#);
        wrong_hash.signature = Some(compute_signature("other"));
        let outcome = p.handle(wrong_hash).await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.body["error"], "Invalid x-hash signature");
    }

    #[tokio::test]
    async fn test_bad_bodies_never_reach_lookup() {
        let source = ScriptedSource::ok();
        let p = pipeline(source.clone());

        for body in ["", "{", "not json", "[1,2]", r#""tx-1""#] {
            let outcome = p.handle(delivery(body)).await;
            assert_eq!(outcome.status, StatusCode::BAD_REQUEST, "body {:?}", body);
            let error = outcome.body["error"].as_str().unwrap();
            assert!(error.starts_with("Invalid JSON body"), "{}", error);
        }

        for body in ["{}", r#"{"id":""}"#, r#"{"id":42}"#, r#"{"id":null}"#] {
            let outcome = p.handle(delivery(body)).await;
            assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
            assert_eq!(outcome.body["error"], "Missing transaction ID");
        }

        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_max() {
        let source = ScriptedSource::ok();
        let p = pipeline(source.clone())
            .with_rate_limiter(RateLimiter::in_memory(2, Duration::from_secs(60)));

        assert!(p.handle(delivery(r#"{"id":"a"}"#)).await.is_success());
        assert!(p.handle(delivery(r#"{"id":"b"}"#)).await.is_success());
        let outcome = p.handle(delivery(r#"{"id":"c"}"#)).await;
        assert_eq!(outcome.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(outcome.body["error"], "Too many requests");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic_500() {
        let source = ScriptedSource::failing(ApiError::Api {
            status: 404,
            message: "Order not found".into(),
        });
        let outcome = pipeline(source.clone()).handle(delivery(r#"{"id":"tx-404"}"#)).await;

        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.body, json!({"success": false, "error": "Internal server error"}));
        // 4xx from the vendor is not retried
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_upstream_failure_retried() {
        let source = ScriptedSource::failing(ApiError::Transport("connection reset".into()));
        let outcome = pipeline(source.clone()).handle(delivery(r#"{"id":"tx-5"}"#)).await;

        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_side_effect_keeps_success() {
        let p = pipeline(ScriptedSource::ok()).with_side_effect(Arc::new(FailingHook));
        let outcome = p.handle(delivery(r#"{"id":"tx-1"}"#)).await;
        assert_eq!(outcome.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_answered_202() {
        let p = pipeline(ScriptedSource::ok());
        let _held = p.inflight().try_begin("tx-dup").unwrap();

        let outcome = p.handle(delivery(r#"{"id":"tx-dup"}"#)).await;
        assert_eq!(outcome.status, StatusCode::ACCEPTED);
        assert_eq!(outcome.body["message"], "Webhook already in progress");
    }

    #[tokio::test]
    async fn test_sender_outside_allowlist_rejected() {
        let source = ScriptedSource::ok();
        let p = pipeline(source.clone())
            .with_ip_filter(IpFilter::new(vec!["203.0.113.50".parse().unwrap()]));

        let outcome = p.handle(delivery(r#"{"id":"tx-1"}"#)).await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.body["error"], "IP address not allowed");

        let mut unknown = delivery(r#"{"id":"tx-1"}"#);
        unknown.client_ip = None;
        assert_eq!(p.handle(unknown).await.status, StatusCode::FORBIDDEN);

        let mut listed = delivery(r#"{"id":"tx-1"}"#);
        listed.client_ip = Some("203.0.113.50".parse().unwrap());
        assert_eq!(p.handle(listed).await.status, StatusCode::OK);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_forwarded_for_from_untrusted_peer_does_not_split_rate_limit() {
        let p = pipeline(ScriptedSource::ok())
            .with_rate_limiter(RateLimiter::in_memory(3, Duration::from_secs(60)));
        let peer: SocketAddr = "198.51.100.9:40000".parse().unwrap();

        let mut statuses = Vec::new();
        for i in 0..5 {
            let mut headers = HeaderMap::new();
            headers.insert("user-agent", WEBHOOK_USER_AGENT.parse().unwrap());
            headers.insert("x-hash", compute_signature(API_KEY).parse().unwrap());
            headers.insert("x-forwarded-for", format!("10.0.0.{}", i).parse().unwrap());
            let body = Bytes::from(format!(r#"{{"id":"tx-{}"}}"#, i));

            let request = p.request_from_parts(Method::POST, &headers, body, Some(peer));
            assert_eq!(request.client_ip_label(), "198.51.100.9");
            statuses.push(p.handle(request).await.status);
        }

        assert_eq!(&statuses[..3], &[StatusCode::OK; 3]);
        assert_eq!(&statuses[3..], &[StatusCode::TOO_MANY_REQUESTS; 2]);
    }

    #[tokio::test]
    async fn test_every_stage_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhook.log");
        let source = ScriptedSource::failing(ApiError::Transport("reset".into()));
        let p = pipeline(source)
            .with_retry(RetryExecutor::new(2, Duration::from_millis(1)))
            .with_event_log(Arc::new(WebhookEventLog::new(path.clone(), true)));
        p.handle(delivery(r#"{"id":"tx-1"}"#)).await;

        let ok = pipeline(ScriptedSource::ok())
            .with_event_log(Arc::new(WebhookEventLog::new(path.clone(), true)));
        ok.handle(delivery(r#"{"id":"tx-2"}"#)).await;

        let records = crate::webhook::event_log::read_records(&path).await.unwrap();
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Webhook request started",
                "Webhook authenticated",
                "Webhook received",
                "Rate limit passed",
                "Order status lookup started",
                "Order status lookup attempt failed",
                "Order status lookup attempt failed",
                "Order status lookup failed",
                "Error processing webhook",
                "Webhook request started",
                "Webhook authenticated",
                "Webhook received",
                "Rate limit passed",
                "Order status lookup started",
                "Order status lookup finished",
                "Transaction processed",
                "Side effects finished",
                "Webhook response sent",
            ]
        );

        let failed = &records[7];
        assert_eq!(failed.data["attempts"], 2);
        assert!(failed.data["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed after 2 retries"));
        assert_eq!(records[5].data["attempt"], 1);
        assert_eq!(records[6].data["attempt"], 2);

        let finished = &records[14];
        assert_eq!(finished.data["attempts"], 1);
        assert_eq!(finished.data["status"], "SUCCESS");
        assert!(records[9..].iter().all(|r| r.request_id == records[9].request_id));
        assert_ne!(records[0].request_id, records[9].request_id);
    }
}
