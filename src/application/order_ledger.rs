use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus, OrderTransition, OrderUpdate};
use crate::domain::ports::OrderStoreRef;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

/// Source of truth for orders and the amounts owed, paid and refunded.
///
/// Every status change goes through the store's atomic update, so concurrent
/// callers see either the old record or the new one, never a blend.
#[derive(Clone)]
pub struct OrderLedger {
    orders: OrderStoreRef,
}

impl OrderLedger {
    pub fn new(orders: OrderStoreRef) -> Self {
        Self { orders }
    }

    /// Opens a `pending` order with a fresh order number.
    pub async fn create_order(
        &self,
        user_id: &str,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Order> {
        let order = Order::new(user_id, amount, description);
        self.orders.insert(order.clone()).await?;
        info!(order_id = %order.id, order_no = %order.order_no, user_id, %amount, "order created");
        Ok(order)
    }

    pub async fn update_status(&self, order_id: Uuid, transition: OrderTransition) -> Result<Order> {
        let target = transition.target();
        let order = self
            .orders
            .update(order_id, OrderUpdate::Transition(transition))
            .await?;
        info!(%order_id, status = %target, "order status updated");
        Ok(order)
    }

    pub async fn link_message(&self, order_id: Uuid, message_id: Uuid) -> Result<Order> {
        let order = self
            .orders
            .update(order_id, OrderUpdate::LinkMessage(message_id))
            .await?;
        debug!(%order_id, %message_id, "message linked to order");
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))
    }

    /// Like [`get`](Self::get), but orders of other users are reported as
    /// missing.
    pub async fn get_owned(&self, user_id: &str, order_id: Uuid) -> Result<Order> {
        match self.orders.get(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(ServiceError::not_found("order", order_id)),
        }
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        self.orders.list_by_user(user_id).await
    }

    /// Withdraws an unpaid order.
    pub async fn cancel(&self, user_id: &str, order_id: Uuid) -> Result<Order> {
        let order = self.get_owned(user_id, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidTransition {
                entity: "order",
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }
        self.update_status(order_id, OrderTransition::Cancelled { at: Utc::now() })
            .await
    }
}
