use rust_decimal_macros::dec;
use smsrelay::domain::message::{Message, MessageTransition};
use smsrelay::domain::money::Money;
use smsrelay::domain::order::{Order, OrderTransition};
use smsrelay::domain::ports::Stores;
use smsrelay::gateway::ApprovalPolicy;
use smsrelay::gateway::payment::{MockPaymentGateway, PaymentGatewayRef};
use smsrelay::gateway::sms::{MockSmsGateway, SmsGatewayRef};
use smsrelay::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let stores = Stores::shared(InMemoryStore::new());
    let orders = stores.orders.clone();
    let messages = stores.messages.clone();

    let order = Order::new("alice", Money::new(dec!(1.00)).unwrap(), "SMS send - 5 chars");
    let order_id = order.id;

    // Verify Send + Sync by spawning tasks
    let order_handle = tokio::spawn(async move {
        orders.insert(order).await.unwrap();
        orders
            .update(
                order_id,
                OrderTransition::Paid {
                    transaction_id: "wx_1".to_string(),
                    at: chrono::Utc::now(),
                }
                .into(),
            )
            .await
            .unwrap()
    });

    let message = Message::new("alice", order_id, "13800000000", "hello", Money::from_cents(100), None);
    let message_id = message.id;
    let message_handle = tokio::spawn(async move {
        messages.insert(message).await.unwrap();
        messages
            .update(message_id, MessageTransition::Sending)
            .await
            .unwrap()
    });

    let paid = order_handle.await.unwrap();
    assert_eq!(paid.payment_transaction_id.as_deref(), Some("wx_1"));

    let sending = message_handle.await.unwrap();
    assert_eq!(sending.order_id, order_id);

    // Every port sees the same backend
    let stored = stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(stored, paid);
    assert!(stores.messages.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_gateways_as_trait_objects() {
    let payments: PaymentGatewayRef = Arc::new(MockPaymentGateway::instant(ApprovalPolicy::Always));
    let sms: SmsGatewayRef = Arc::new(MockSmsGateway::new(ApprovalPolicy::Never));

    let charge = tokio::spawn({
        let payments = Arc::clone(&payments);
        async move { payments.charge(Uuid::new_v4(), Money::from_cents(200)).await }
    });
    let dispatch = tokio::spawn(async move { sms.dispatch("13800000000", "hello").await });

    assert!(charge.await.unwrap().unwrap().success);
    let outcome = dispatch.await.unwrap().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("isv.MOCK_REJECTED"));
    assert_eq!(payments.name(), "mock");
}
