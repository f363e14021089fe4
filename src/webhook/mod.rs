//! Webhook receiver for vendor order callbacks
//!
//! # Modules
//!
//! - [`ip_filter`]: sender address resolution and allowlist
//! - [`signature`]: `User-Agent` and `x-hash` verification
//! - [`rate_limit`]: trailing-window limiter and its stores
//! - [`retry`]: exponential backoff for the status lookup
//! - [`event_log`]: JSON-lines event log
//! - [`inflight`]: concurrent duplicate detection
//! - [`hooks`]: side effects after a successful lookup
//! - [`pipeline`]: the validation and processing stages
//! - [`handler`]: axum router
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use termgame_seller::{SellerClient, SellerConfig};
//! use termgame_seller::webhook::{webhook_router, LoggingSideEffect, WebhookPipeline};
//!
//! let config = SellerConfig::from_env()?;
//! let client = Arc::new(SellerClient::from_config(&config.api)?);
//! let pipeline = WebhookPipeline::from_config(&config, client)
//!     .with_side_effect(Arc::new(LoggingSideEffect));
//! let app = webhook_router(Arc::new(pipeline), &config.webhook.path);
//! ```

pub mod event_log;
pub mod handler;
pub mod hooks;
pub mod inflight;
pub mod ip_filter;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod signature;

pub use event_log::{EventRecord, LogLevel, WebhookEventLog};
pub use handler::{serve, webhook_health, webhook_router};
pub use hooks::{LoggingSideEffect, NoOpSideEffect, OrderSideEffect};
pub use inflight::{InFlightGuard, InFlightTracker};
pub use ip_filter::{resolve_client_ip, IpFilter};
pub use pipeline::{WebhookOutcome, WebhookPipeline, WebhookRequest};
pub use rate_limit::{
    FileRateLimitStore, InMemoryRateLimitStore, RateLimitEntry, RateLimitStore, RateLimiter,
};
pub use retry::RetryExecutor;
pub use signature::{compute_signature, SignatureVerifier};
