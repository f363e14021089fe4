//! Side effects run after a successful order status lookup
//!
//! Database updates and customer notifications live outside this crate and
//! plug in through [`OrderSideEffect`]. A failing hook is logged and never
//! changes the webhook response.

use async_trait::async_trait;

use crate::client::{OrderState, OrderStatus};

/// Reacts to a fetched order status
#[async_trait]
pub trait OrderSideEffect: Send + Sync {
    /// Name used in logs when the hook fails
    fn name(&self) -> &str;

    /// Called once per processed delivery
    async fn on_order_status(
        &self,
        transaction_id: &str,
        status: &OrderStatus,
    ) -> anyhow::Result<()>;
}

/// Hook that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSideEffect;

#[async_trait]
impl OrderSideEffect for NoOpSideEffect {
    fn name(&self) -> &str {
        "noop"
    }

    async fn on_order_status(
        &self,
        _transaction_id: &str,
        _status: &OrderStatus,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hook that records each order outcome as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSideEffect;

#[async_trait]
impl OrderSideEffect for LoggingSideEffect {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_order_status(
        &self,
        transaction_id: &str,
        status: &OrderStatus,
    ) -> anyhow::Result<()> {
        match &status.status {
            OrderState::Failed => tracing::warn!(
                transaction_id = %transaction_id,
                status = %status.status,
                game = ?status.product_name(),
                package = ?status.package_name(),
                player_id = ?status.player_id,
                fail_reason = ?status.fail_reason,
                "Order status recorded"
            ),
            _ => tracing::info!(
                transaction_id = %transaction_id,
                status = %status.status,
                game = ?status.product_name(),
                package = ?status.package_name(),
                amount = status.paid,
                player_id = ?status.player_id,
                "Order status recorded"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_builtin_hooks_succeed() {
        let status: OrderStatus = serde_json::from_value(json!({
            "orderId": "tx-1",
            "status": "FAILED",
            "paid": 0,
            "failReason": "Invalid player id"
        }))
        .unwrap();

        assert!(LoggingSideEffect.on_order_status("tx-1", &status).await.is_ok());
        assert!(NoOpSideEffect.on_order_status("tx-1", &status).await.is_ok());
        assert_eq!(LoggingSideEffect.name(), "logging");
    }
}
