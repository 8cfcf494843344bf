use crate::domain::bill::Bill;
use crate::domain::message::{Message, MessageTransition};
use crate::domain::order::{Order, OrderUpdate};
use crate::domain::payment_record::PaymentRecord;
use crate::domain::ports::{BillStore, MessageStore, OrderStore, PaymentRecordStore, RefundStore};
use crate::domain::refund::RefundRecord;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct OrderTable {
    rows: HashMap<Uuid, Order>,
    by_order_no: HashMap<String, Uuid>,
}

/// A thread-safe in-memory backend for every storage port.
///
/// Each table sits behind its own `RwLock`; updates take the write lock for
/// the whole read-modify-write so concurrent transitions on one record are
/// serialized. `Clone` shares the underlying tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    orders: Arc<RwLock<OrderTable>>,
    messages: Arc<RwLock<HashMap<Uuid, Message>>>,
    refunds: Arc<RwLock<Vec<RefundRecord>>>,
    bills: Arc<RwLock<Vec<Bill>>>,
    payments: Arc<RwLock<Vec<PaymentRecord>>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut table = self.orders.write().await;
        if table.rows.contains_key(&order.id) {
            return Err(ServiceError::persistence(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        if table.by_order_no.contains_key(&order.order_no) {
            return Err(ServiceError::persistence(format!(
                "duplicate order number {}",
                order.order_no
            )));
        }
        table.by_order_no.insert(order.order_no.clone(), order.id);
        table.rows.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        let table = self.orders.read().await;
        Ok(table.rows.get(&order_id).cloned())
    }

    async fn update(&self, order_id: Uuid, change: OrderUpdate) -> Result<Order> {
        let mut table = self.orders.write().await;
        let current = table
            .rows
            .get(&order_id)
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;

        // Work on a copy so a rejected change leaves the stored row intact.
        let mut next = current.clone();
        next.update(change)?;
        table.rows.insert(order_id, next.clone());
        Ok(next)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let table = self.orders.read().await;
        let mut orders: Vec<Order> = table
            .rows
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, message: Message) -> Result<()> {
        let mut messages = self.messages.write().await;
        if messages.contains_key(&message.id) {
            return Err(ServiceError::persistence(format!(
                "duplicate message id {}",
                message.id
            )));
        }
        messages.insert(message.id, message);
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> Result<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages.get(&message_id).cloned())
    }

    async fn update(&self, message_id: Uuid, change: MessageTransition) -> Result<Message> {
        let mut messages = self.messages.write().await;
        let current = messages
            .get(&message_id)
            .ok_or_else(|| ServiceError::not_found("message", message_id))?;

        let mut next = current.clone();
        next.apply(change)?;
        messages.insert(message_id, next.clone());
        Ok(next)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut found: Vec<Message> = messages
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl RefundStore for InMemoryStore {
    async fn insert(&self, refund: RefundRecord) -> Result<()> {
        self.refunds.write().await.push(refund);
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<RefundRecord>> {
        let refunds = self.refunds.read().await;
        Ok(refunds
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BillStore for InMemoryStore {
    async fn append(&self, bill: Bill) -> Result<()> {
        self.bills.write().await.push(bill);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>> {
        let bills = self.bills.read().await;
        // Appended in order, so reversing gives newest first.
        Ok(bills
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRecordStore for InMemoryStore {
    async fn append(&self, record: PaymentRecord) -> Result<()> {
        self.payments.write().await.push(record);
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }
}
