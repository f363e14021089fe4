//! Termgame Seller - Game Top-Up API Client and Webhook Receiver
//!
//! This crate talks to the Termgame Seller V2 reseller API and receives its
//! order status callbacks.
//!
//! # Features
//!
//! - **API Client**: balance, catalog, orders, order status and purchases
//! - **Catalog Helpers**: active filters, name/id lookup, price formatting
//! - **Webhook Receiver**: authenticated, rate-limited, retried and logged
//!   processing of vendor callbacks, served with axum
//!
//! # Architecture
//!
//! ```text
//! Vendor ──POST──▶ Router ──▶ WebhookPipeline
//!                                  │
//!        ┌──────────┬──────────────┼───────────────┬───────────────┐
//!        ▼          ▼              ▼               ▼               ▼
//!   Signature   RateLimiter   InFlightTracker  RetryExecutor   Side effects
//!   Verifier                                       │
//!                                                  ▼
//!                                             SellerClient ──▶ Vendor API
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use termgame_seller::client::{format_price, SellerClient, DEFAULT_CURRENCY};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SellerClient::new("your-api-key", Duration::from_secs(30))?;
//!
//!     let balance = client.balance_amount().await?;
//!     println!("Balance: {}", format_price(balance, DEFAULT_CURRENCY));
//!
//!     for product in client.active_products().await? {
//!         println!("{} ({} packages)", product.name, product.packages.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod webhook;

// Re-exports for convenience
pub use client::{BuyRequest, OrderStatus, OrderStatusSource, SellerClient};
pub use config::SellerConfig;
pub use error::{ApiError, Error, Result, WebhookError};
pub use webhook::{webhook_router, WebhookPipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
