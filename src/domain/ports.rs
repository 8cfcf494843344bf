use super::bill::Bill;
use super::message::{Message, MessageTransition};
use super::order::{Order, OrderUpdate};
use super::payment_record::PaymentRecord;
use super::refund::RefundRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Orders, keyed by id with a unique index on the order number.
///
/// `update` is an atomic read-modify-write: the change is applied to the
/// current record and persisted as a whole, or not at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn update(&self, order_id: Uuid, change: OrderUpdate) -> Result<Order>;
    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: Message) -> Result<()>;
    async fn get(&self, message_id: Uuid) -> Result<Option<Message>>;
    async fn update(&self, message_id: Uuid, change: MessageTransition) -> Result<Message>;
    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Message>>;
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn insert(&self, refund: RefundRecord) -> Result<()>;
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<RefundRecord>>;
}

#[async_trait]
pub trait BillStore: Send + Sync {
    async fn append(&self, bill: Bill) -> Result<()>;
    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>>;
}

#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    async fn append(&self, record: PaymentRecord) -> Result<()>;
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentRecord>>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type MessageStoreRef = Arc<dyn MessageStore>;
pub type RefundStoreRef = Arc<dyn RefundStore>;
pub type BillStoreRef = Arc<dyn BillStore>;
pub type PaymentRecordStoreRef = Arc<dyn PaymentRecordStore>;

/// Storage handles injected into every component at construction.
#[derive(Clone)]
pub struct Stores {
    pub orders: OrderStoreRef,
    pub messages: MessageStoreRef,
    pub refunds: RefundStoreRef,
    pub bills: BillStoreRef,
    pub payments: PaymentRecordStoreRef,
}

impl Stores {
    /// Wires every port to the same backend instance.
    pub fn shared<B>(backend: B) -> Self
    where
        B: OrderStore + MessageStore + RefundStore + BillStore + PaymentRecordStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            orders: backend.clone(),
            messages: backend.clone(),
            refunds: backend.clone(),
            bills: backend.clone(),
            payments: backend,
        }
    }
}
