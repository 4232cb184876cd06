//! Inbound order lifecycle events.
//!
//! The order subsystem calls these once per order. Errors are returned to
//! the caller unchanged.

use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{Commission, Order, ResultEngine, util::ensure_positive_amount};

use super::{Engine, with_tx};

impl Engine {
    /// Creates the referral commissions of a completed order.
    pub async fn on_order_completed(&self, order: &Order) -> ResultEngine<Vec<Commission>> {
        with_tx!(self, |db_tx| self.on_order_completed_in(&db_tx, order).await)
    }

    pub async fn on_order_completed_in(
        &self,
        db_tx: &DatabaseTransaction,
        order: &Order,
    ) -> ResultEngine<Vec<Commission>> {
        ensure_positive_amount(order.amount_minor)?;
        let created = self.create_order_commissions_in(db_tx, order).await?;
        tracing::info!(
            "order {} ({}) completed: {} commissions",
            order.order_id,
            order.order_no,
            created.len()
        );
        Ok(created)
    }

    /// Cancels the referral commissions of a refunded order.
    pub async fn on_order_refunded(&self, order: &Order) -> ResultEngine<Vec<Commission>> {
        with_tx!(self, |db_tx| self.on_order_refunded_in(&db_tx, order).await)
    }

    pub async fn on_order_refunded_in(
        &self,
        db_tx: &DatabaseTransaction,
        order: &Order,
    ) -> ResultEngine<Vec<Commission>> {
        self.cancel_commissions_by_order_in(db_tx, order.order_id)
            .await
    }
}
