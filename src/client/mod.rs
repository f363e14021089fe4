//! Termgame Seller V2 API client
//!
//! - [`SellerClient`]: authenticated HTTP calls (balance, catalog, orders, purchase)
//! - [`catalog`]: pure filters and formatting over fetched data
//! - [`types`]: wire types

pub mod catalog;
pub mod http;
pub mod types;

pub use catalog::{format_price, DEFAULT_CURRENCY};
pub use http::{SellerClient, DEFAULT_TIMEOUT};
pub use types::{
    Balance, BuyRequest, LastResponse, OrderState, OrderStatus, OrderSummary, Package, Product,
    ProductRef, PurchaseResult, PurchaseTarget,
};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiResult;

/// Anything that can look up the authoritative status of an order.
///
/// The webhook pipeline depends on this rather than on [`SellerClient`] so
/// tests can substitute a scripted source.
#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    /// Fetch the current status of `order_id`
    async fn order_status(&self, order_id: &str) -> ApiResult<OrderStatus>;
}

#[async_trait]
impl<T: OrderStatusSource + ?Sized> OrderStatusSource for Arc<T> {
    async fn order_status(&self, order_id: &str) -> ApiResult<OrderStatus> {
        (**self).order_status(order_id).await
    }
}
