use crate::domain::bill::Bill;
use crate::domain::message::{Message, MessageTransition};
use crate::domain::order::{Order, OrderUpdate};
use crate::domain::payment_record::PaymentRecord;
use crate::domain::ports::{BillStore, MessageStore, OrderStore, PaymentRecordStore, RefundStore};
use crate::domain::refund::RefundRecord;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for orders, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family mapping order numbers to order ids (unique index).
pub const CF_ORDER_NUMBERS: &str = "order_numbers";
/// Column Family for messages, keyed by message id.
pub const CF_MESSAGES: &str = "messages";
/// Column Family for refund records, keyed by order id + refund id.
pub const CF_REFUNDS: &str = "refunds";
/// Column Family for bills, keyed by user id + creation time + bill id.
pub const CF_BILLS: &str = "bills";
/// Column Family for payment records, keyed by order id + record id.
pub const CF_PAYMENTS: &str = "payments";

const COLUMN_FAMILIES: [&str; 6] = [
    CF_ORDERS,
    CF_ORDER_NUMBERS,
    CF_MESSAGES,
    CF_REFUNDS,
    CF_BILLS,
    CF_PAYMENTS,
];

/// A persistent backend for every storage port using RocksDB.
///
/// Each entity lives in its own Column Family. Values are JSON encoded.
/// Read-modify-write updates are serialized through `write_lock`, which makes
/// every status transition atomic per record for this process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ServiceError::persistence(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    /// Decodes every value whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut found = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(serde_json::from_slice(&value)?);
        }

        Ok(found)
    }

    /// Decodes every value of a column family.
    fn scan_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        self.scan_prefix(cf_name, &[])
    }
}

fn composite_key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// User ids are variable length; a NUL terminator keeps `alice` from
/// matching `alice2` on a prefix scan.
fn user_prefix(user_id: &str) -> Vec<u8> {
    composite_key(user_id.as_bytes(), &[0])
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let numbers = self.cf(CF_ORDER_NUMBERS)?;
        if self.db.get_pinned_cf(numbers, order.order_no.as_bytes())?.is_some() {
            return Err(ServiceError::persistence(format!(
                "duplicate order number {}",
                order.order_no
            )));
        }
        let orders = self.cf(CF_ORDERS)?;
        if self.db.get_pinned_cf(orders, order.id.as_bytes())?.is_some() {
            return Err(ServiceError::persistence(format!(
                "duplicate order id {}",
                order.id
            )));
        }

        // Row and index land together or not at all.
        let mut batch = WriteBatch::default();
        batch.put_cf(orders, order.id.as_bytes(), serde_json::to_vec(&order)?);
        batch.put_cf(numbers, order.order_no.as_bytes(), order.id.as_bytes());
        self.db.write(batch)?;

        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        self.read(CF_ORDERS, order_id.as_bytes())
    }

    async fn update(&self, order_id: Uuid, change: OrderUpdate) -> Result<Order> {
        let _guard = self.write_lock.lock().await;

        let mut order: Order = self
            .read(CF_ORDERS, order_id.as_bytes())?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;
        order.update(change)?;
        self.write(CF_ORDERS, order_id.as_bytes(), &order)?;

        Ok(order)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan_all::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl MessageStore for RocksDBStore {
    async fn insert(&self, message: Message) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(CF_MESSAGES, message.id.as_bytes(), &message)
    }

    async fn get(&self, message_id: Uuid) -> Result<Option<Message>> {
        self.read(CF_MESSAGES, message_id.as_bytes())
    }

    async fn update(&self, message_id: Uuid, change: MessageTransition) -> Result<Message> {
        let _guard = self.write_lock.lock().await;

        let mut message: Message = self
            .read(CF_MESSAGES, message_id.as_bytes())?
            .ok_or_else(|| ServiceError::not_found("message", message_id))?;
        message.apply(change)?;
        self.write(CF_MESSAGES, message_id.as_bytes(), &message)?;

        Ok(message)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .scan_all::<Message>(CF_MESSAGES)?
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }
}

#[async_trait]
impl RefundStore for RocksDBStore {
    async fn insert(&self, refund: RefundRecord) -> Result<()> {
        let key = composite_key(refund.order_id.as_bytes(), refund.id.as_bytes());
        self.write(CF_REFUNDS, &key, &refund)
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<RefundRecord>> {
        self.scan_prefix(CF_REFUNDS, order_id.as_bytes())
    }
}

#[async_trait]
impl BillStore for RocksDBStore {
    async fn append(&self, bill: Bill) -> Result<()> {
        let nanos = bill.created_at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let key = composite_key(
            &composite_key(&user_prefix(&bill.user_id), &nanos.to_be_bytes()),
            bill.id.as_bytes(),
        );
        self.write(CF_BILLS, &key, &bill)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self.scan_prefix(CF_BILLS, &user_prefix(user_id))?;
        bills.reverse();
        Ok(bills)
    }
}

#[async_trait]
impl PaymentRecordStore for RocksDBStore {
    async fn append(&self, record: PaymentRecord) -> Result<()> {
        let key = composite_key(record.order_id.as_bytes(), record.id.as_bytes());
        self.write(CF_PAYMENTS, &key, &record)
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<PaymentRecord>> {
        self.scan_prefix(CF_PAYMENTS, order_id.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bill::BillKind;
    use crate::domain::money::Money;
    use crate::domain::order::{OrderStatus, OrderTransition};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn order(user: &str) -> Order {
        Order::new(user, Money::new(dec!(2.00)).unwrap(), "SMS send - 61 chars")
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some(), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_rocksdb_order_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let order = order("alice");

        OrderStore::insert(&store, order.clone()).await.unwrap();
        let retrieved = OrderStore::get(&store, order.id).await.unwrap().unwrap();
        assert_eq!(retrieved, order);

        let paid = OrderStore::update(
            &store,
            order.id,
            OrderTransition::Paid {
                transaction_id: "wx_1".to_string(),
                at: Utc::now(),
            }
            .into(),
        )
        .await
        .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);

        let reread = OrderStore::get(&store, order.id).await.unwrap().unwrap();
        assert_eq!(reread, paid);

        let dup = OrderStore::insert(&store, order.clone()).await;
        assert!(matches!(dup, Err(ServiceError::PersistenceError(_))));
    }

    #[tokio::test]
    async fn test_rocksdb_bills_prefix_isolation() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        for user in ["alice", "alice2", "alice"] {
            let bill = Bill {
                id: Uuid::new_v4(),
                user_id: user.to_string(),
                order_id: None,
                kind: BillKind::Payment,
                amount: Money::new(dec!(1.00)).unwrap(),
                balance_before: Money::ZERO,
                balance_after: Money::ZERO,
                description: "test".to_string(),
                created_at: Utc::now(),
            };
            BillStore::append(&store, bill).await.unwrap();
        }

        let alice = BillStore::list_by_user(&store, "alice").await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice[0].created_at >= alice[1].created_at);
        assert_eq!(
            BillStore::list_by_user(&store, "alice2").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_rocksdb_refunds_by_order() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let order_id = Uuid::new_v4();

        let refund = RefundRecord::completed(
            order_id,
            Money::new(dec!(1.00)).unwrap(),
            "delivery failed",
            "refund_1",
            Utc::now(),
        );
        RefundStore::insert(&store, refund.clone()).await.unwrap();

        let found = RefundStore::list_by_order(&store, order_id).await.unwrap();
        assert_eq!(found, vec![refund]);
        assert!(
            RefundStore::list_by_order(&store, Uuid::new_v4())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
