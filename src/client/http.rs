//! HTTP client for the Termgame Seller V2 API

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::catalog;
use super::types::{
    Balance, BuyRequest, LastResponse, OrderStatus, OrderSummary, Product, PurchaseResult,
};
use super::OrderStatusSource;
use crate::config::{ApiConfig, DEFAULT_BASE_URL};
use crate::error::{ApiError, ApiResult};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the vendor API.
///
/// Every call is a single request with no retry. A failed call returns an
/// [`ApiError`]; the caller decides whether to retry.
///
/// The client can be shared across tasks. [`SellerClient::last_response`]
/// reflects whichever call finished parsing last.
pub struct SellerClient {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    timeout: Duration,
    last_response: Mutex<Option<LastResponse>>,
}

impl std::fmt::Debug for SellerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SellerClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SellerClient {
    /// Create a client against the production base URL
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] when the key is empty.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        Self::build(api_key.into(), DEFAULT_BASE_URL, timeout)
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        Self::build(config.api_key().to_string(), &config.base_url, config.timeout)
    }

    /// Point the client at another base URL (sandbox, local mock)
    pub fn with_base_url(mut self, base_url: &str) -> ApiResult<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    fn build(api_key: String, base_url: &str, timeout: Duration) -> ApiResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ApiError::InvalidRequest("API key cannot be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: parse_base_url(base_url)?,
            timeout,
            last_response: Mutex::new(None),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Snapshot of the most recent successfully parsed response
    pub fn last_response(&self) -> Option<LastResponse> {
        self.last_response.lock().clone()
    }

    // =========================================================================
    // Transport
    // =========================================================================

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidRequest("base URL cannot carry a path".into()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// Send one request and return the parsed JSON body.
    ///
    /// Status >= 400 fails with the vendor's `message` when it sent one. A
    /// non-JSON body is a protocol error, except on 5xx where it becomes
    /// `HTTP Error <code>`. The last-response snapshot is only updated once the
    /// body parses.
    #[instrument(skip(self, body))]
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> ApiResult<Value> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Sending API request");

        let mut builder = self
            .http
            .request(method.clone(), url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        if method == Method::POST {
            if let Some(body) = body.filter(|b| !is_empty_payload(b)) {
                let encoded =
                    serde_json::to_vec(&body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                builder = builder.body(encoded);
            }
        }

        let response = builder.send().await.map_err(|e| self.map_transport(e))?;
        let status_code = response.status().as_u16();
        let raw = response.text().await.map_err(|e| self.map_transport(e))?;

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            // Gateway error pages on 5xx are usually HTML
            Err(e) if status_code >= 500 => {
                warn!(status = status_code, error = %e, "API returned a non-JSON error page");
                return Err(ApiError::Api {
                    status: status_code,
                    message: format!("HTTP Error {}", status_code),
                });
            }
            Err(e) => {
                warn!(status = status_code, error = %e, "API returned a non-JSON body");
                return Err(ApiError::Protocol(e.to_string()));
            }
        };

        *self.last_response.lock() = Some(LastResponse {
            status_code,
            body: parsed.clone(),
            raw,
        });

        if status_code >= 400 {
            let message = vendor_message(&parsed)
                .unwrap_or_else(|| format!("HTTP Error {}", status_code));
            debug!(status = status_code, message = %message, "API request rejected");
            return Err(ApiError::Api {
                status: status_code,
                message,
            });
        }

        Ok(parsed)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let body = self.request(Method::GET, segments, None).await?;
        decode(body)
    }

    fn map_transport(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout.as_secs())
        } else {
            ApiError::Transport(err.to_string())
        }
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// `GET /balance`
    pub async fn balance(&self) -> ApiResult<Balance> {
        self.get(&["balance"]).await
    }

    /// Current balance as a number
    pub async fn balance_amount(&self) -> ApiResult<f64> {
        let balance = self.balance().await?;
        Ok(catalog::balance_amount(Some(&balance)))
    }

    /// Whether the balance covers `amount`
    pub async fn has_enough_balance(&self, amount: f64) -> ApiResult<bool> {
        let balance = self.balance_amount().await?;
        Ok(catalog::has_enough_balance(balance, amount))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// `GET /products`
    pub async fn products(&self) -> ApiResult<Vec<Product>> {
        self.get(&["products"]).await
    }

    /// Products that can currently be bought
    pub async fn active_products(&self) -> ApiResult<Vec<Product>> {
        let products = self.products().await?;
        Ok(catalog::active_products(&products))
    }

    /// First product whose name contains `name`, ignoring case
    pub async fn find_product_by_name(&self, name: &str) -> ApiResult<Option<Product>> {
        let products = self.products().await?;
        Ok(catalog::find_product_by_name(&products, name).cloned())
    }

    /// Product with exactly this id
    pub async fn find_product_by_id(&self, id: &str) -> ApiResult<Option<Product>> {
        let products = self.products().await?;
        Ok(catalog::find_product_by_id(&products, id).cloned())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// `GET /orders`
    pub async fn orders(&self) -> ApiResult<Vec<OrderSummary>> {
        self.get(&["orders"]).await
    }

    /// `GET /order-status/{orderId}`
    pub async fn order_status(&self, order_id: &str) -> ApiResult<OrderStatus> {
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("order id cannot be empty".into()));
        }
        self.get(&["order-status", order_id]).await
    }

    /// `POST /buy/{packageId}`
    #[instrument(skip(self, request))]
    pub async fn buy_package(
        &self,
        package_id: &str,
        request: &BuyRequest,
    ) -> ApiResult<PurchaseResult> {
        if package_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("package id cannot be empty".into()));
        }
        let payload =
            serde_json::to_value(request).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let body = self.request(Method::POST, &["buy", package_id], Some(payload)).await?;
        decode(body)
    }

    /// Buy for a player id, optionally in a zone
    pub async fn buy_with_player_id(
        &self,
        package_id: &str,
        player_id: &str,
        zone_id: Option<&str>,
        callback_url: Option<&str>,
    ) -> ApiResult<PurchaseResult> {
        let mut request = BuyRequest::player_id(player_id);
        if let Some(zone) = zone_id {
            request = request.with_zone(zone);
        }
        if let Some(callback) = callback_url {
            request = request.with_callback(callback);
        }
        self.buy_package(package_id, &request).await
    }

    /// Buy through a URL
    pub async fn buy_with_url(
        &self,
        package_id: &str,
        url: &str,
        callback_url: Option<&str>,
    ) -> ApiResult<PurchaseResult> {
        let mut request = BuyRequest::url(url);
        if let Some(callback) = callback_url {
            request = request.with_callback(callback);
        }
        self.buy_package(package_id, &request).await
    }

    /// Buy with game account credentials
    pub async fn buy_with_credentials(
        &self,
        package_id: &str,
        username: &str,
        password: &str,
        callback_url: Option<&str>,
    ) -> ApiResult<PurchaseResult> {
        let mut request = BuyRequest::credentials(username, password);
        if let Some(callback) = callback_url {
            request = request.with_callback(callback);
        }
        self.buy_package(package_id, &request).await
    }
}

#[async_trait]
impl OrderStatusSource for SellerClient {
    async fn order_status(&self, order_id: &str) -> ApiResult<OrderStatus> {
        SellerClient::order_status(self, order_id).await
    }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL `{}`: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidRequest(format!(
            "base URL must be http(s), got `{}`",
            url.scheme()
        )));
    }
    Ok(url)
}

fn is_empty_payload(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Vendor error text: a string `message`, or an array of strings joined
fn vendor_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::Protocol(e.to_string()))
}
