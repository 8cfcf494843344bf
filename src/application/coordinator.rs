use super::billing::BillingLedger;
use super::order_ledger::OrderLedger;
use crate::domain::bill::BillKind;
use crate::domain::message::{Message, MessageTransition};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus, OrderTransition};
use crate::domain::payment_record::PaymentRecord;
use crate::domain::ports::{MessageStoreRef, PaymentRecordStoreRef, RefundStoreRef, Stores};
use crate::domain::pricing;
use crate::domain::refund::RefundRecord;
use crate::error::{Result, ServiceError};
use crate::gateway::payment::{ClientPayParams, PaymentGatewayRef, PaymentOutcome};
use crate::gateway::sms::{DispatchOutcome, SmsGatewayRef};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Reason attached to every compensating refund.
pub const REFUND_REASON: &str = "delivery failed";

/// An inbound request to send one SMS.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub user_id: String,
    pub recipient: String,
    pub content: String,
    /// When set, the message is parked as `scheduled` and not dispatched.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Counters for what happened on the background dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CoordinatorStats {
    pub delivered: u64,
    pub delivery_failures: u64,
    pub refunds_issued: u64,
    /// Refunds the processor rejected; the order stays `paid` and needs
    /// manual reconciliation.
    pub unreconciled_refunds: u64,
    /// Charges the processor accepted without a transaction id; the order is
    /// marked `failed` but money may have moved.
    pub unconfirmed_charges: u64,
    /// Dispatch tasks aborted by a storage or state error.
    pub aborted_dispatches: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
    refunds_issued: AtomicU64,
    unreconciled_refunds: AtomicU64,
    unconfirmed_charges: AtomicU64,
    aborted_dispatches: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            refunds_issued: self.refunds_issued.load(Ordering::Relaxed),
            unreconciled_refunds: self.unreconciled_refunds.load(Ordering::Relaxed),
            unconfirmed_charges: self.unconfirmed_charges.load(Ordering::Relaxed),
            aborted_dispatches: self.aborted_dispatches.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    orders: OrderLedger,
    billing: BillingLedger,
    messages: MessageStoreRef,
    refunds: RefundStoreRef,
    payment_records: PaymentRecordStoreRef,
    payments: PaymentGatewayRef,
    sms: SmsGatewayRef,
    counters: Counters,
}

/// Drives one message send from pricing to delivery or refund.
///
/// `send` performs the synchronous part (price, order, charge, message
/// record) and returns as soon as the dispatch task has been spawned. The
/// dispatch task is fire-and-forget: its failures never reach the caller and
/// are only visible through message/order status, bills and [`stats`].
///
/// [`stats`]: Coordinator::stats
pub struct Coordinator {
    inner: Arc<Inner>,
    tasks: Mutex<JoinSet<()>>,
}

impl Coordinator {
    pub fn new(stores: Stores, payments: PaymentGatewayRef, sms: SmsGatewayRef) -> Self {
        let inner = Inner {
            orders: OrderLedger::new(stores.orders),
            billing: BillingLedger::new(stores.bills),
            messages: stores.messages,
            refunds: stores.refunds,
            payment_records: stores.payments,
            payments,
            sms,
            counters: Counters::default(),
        };
        Self {
            inner: Arc::new(inner),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn calculate_cost(&self, content: &str) -> Money {
        pricing::message_cost(content)
    }

    pub async fn send(&self, request: SendRequest) -> Result<Message> {
        validate(&request)?;
        let inner = &self.inner;

        let cost = pricing::message_cost(&request.content);
        let chars = pricing::char_count(&request.content);
        let order = inner
            .orders
            .create_order(&request.user_id, cost, format!("SMS send - {chars} chars"))
            .await?;

        let outcome = match inner.payments.charge(order.id, cost).await {
            Ok(outcome) => outcome,
            Err(e) => PaymentOutcome::declined(e.to_string()),
        };
        inner
            .payment_records
            .append(PaymentRecord::new(
                order.id,
                order.payment_method,
                cost,
                outcome.confirmed_transaction().map(str::to_string),
                serde_json::to_string(&outcome)?,
            ))
            .await?;

        let Some(transaction_id) = outcome.confirmed_transaction() else {
            let reason = if outcome.success {
                Counters::bump(&inner.counters.unconfirmed_charges);
                error!(
                    order_id = %order.id,
                    order_no = %order.order_no,
                    amount = %cost,
                    provider = inner.payments.name(),
                    "charge accepted without a transaction id, needs manual reconciliation"
                );
                "charge unconfirmed: no transaction id".to_string()
            } else {
                outcome.error_message()
            };
            warn!(order_id = %order.id, provider = inner.payments.name(), %reason, "charge failed");
            inner
                .orders
                .update_status(order.id, OrderTransition::Failed)
                .await?;
            return Err(ServiceError::PaymentError(reason));
        };

        inner
            .orders
            .update_status(
                order.id,
                OrderTransition::Paid {
                    transaction_id: transaction_id.to_string(),
                    at: Utc::now(),
                },
            )
            .await?;
        inner
            .billing
            .record(
                &request.user_id,
                Some(order.id),
                BillKind::Payment,
                cost,
                format!("Payment for order {}", order.order_no),
            )
            .await?;

        let message = Message::new(
            request.user_id,
            order.id,
            request.recipient,
            request.content,
            cost,
            request.scheduled_at,
        );
        inner.messages.insert(message.clone()).await?;
        inner.orders.link_message(order.id, message.id).await?;

        if let Some(at) = message.scheduled_at {
            let message = inner
                .messages
                .update(message.id, MessageTransition::Scheduled)
                .await?;
            info!(message_id = %message.id, scheduled_at = %at, "message scheduled");
            return Ok(message);
        }

        info!(message_id = %message.id, order_id = %order.id, "message accepted, dispatching");
        self.spawn_dispatch(message.clone());
        Ok(message)
    }

    fn spawn_dispatch(&self, message: Message) {
        let inner = Arc::clone(&self.inner);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set only holds in-flight work.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { inner.dispatch(message).await });
    }

    /// Waits until every dispatch task spawned so far has finished.
    pub async fn drain(&self) {
        loop {
            let mut pending = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if pending.is_empty() {
                return;
            }
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "dispatch task panicked");
                }
            }
        }
    }

    /// Drains outstanding dispatches and returns the final counters.
    pub async fn shutdown(self) -> CoordinatorStats {
        self.drain().await;
        let stats = self.stats();
        info!(?stats, "coordinator shut down");
        stats
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.inner.counters.snapshot()
    }

    pub async fn message(&self, user_id: &str, message_id: Uuid) -> Result<Message> {
        match self.inner.messages.get(message_id).await? {
            Some(message) if message.user_id == user_id => Ok(message),
            _ => Err(ServiceError::not_found("message", message_id)),
        }
    }

    /// Newest first.
    pub async fn messages(&self, user_id: &str) -> Result<Vec<Message>> {
        self.inner.messages.list_by_user(user_id).await
    }

    pub async fn order(&self, user_id: &str, order_id: Uuid) -> Result<Order> {
        self.inner.orders.get_owned(user_id, order_id).await
    }

    pub async fn refunds(&self, user_id: &str, order_id: Uuid) -> Result<Vec<RefundRecord>> {
        let order = self.inner.orders.get_owned(user_id, order_id).await?;
        self.inner.refunds.list_by_order(order.id).await
    }

    pub async fn payment_records(&self, user_id: &str, order_id: Uuid) -> Result<Vec<PaymentRecord>> {
        let order = self.inner.orders.get_owned(user_id, order_id).await?;
        self.inner.payment_records.list_by_order(order.id).await
    }

    pub async fn cancel_order(&self, user_id: &str, order_id: Uuid) -> Result<Order> {
        self.inner.orders.cancel(user_id, order_id).await
    }

    /// Parameters for the client-side pay sheet of an unpaid order.
    pub async fn client_pay_params(&self, user_id: &str, order_id: Uuid) -> Result<ClientPayParams> {
        let order = self.inner.orders.get_owned(user_id, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::ValidationError(format!(
                "order {} is {}, only pending orders can be paid",
                order.order_no, order.status
            )));
        }
        self.inner.payments.client_params(order.id, order.amount).await
    }

    pub fn billing(&self) -> &BillingLedger {
        &self.inner.billing
    }

    pub fn orders(&self) -> &OrderLedger {
        &self.inner.orders
    }
}

fn validate(request: &SendRequest) -> Result<()> {
    if request.user_id.trim().is_empty() {
        return Err(ServiceError::AuthError("missing user identity".to_string()));
    }
    if request.recipient.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "recipient phone is required".to_string(),
        ));
    }
    if request.content.is_empty() {
        return Err(ServiceError::ValidationError(
            "message content is required".to_string(),
        ));
    }
    Ok(())
}

impl Inner {
    async fn dispatch(&self, message: Message) {
        let message_id = message.id;
        let order_id = message.order_id;
        if let Err(e) = self.try_dispatch(message).await {
            Counters::bump(&self.counters.aborted_dispatches);
            error!(%message_id, %order_id, error = %e, "dispatch aborted");
        }
    }

    async fn try_dispatch(&self, message: Message) -> Result<()> {
        let order = self.orders.get(message.order_id).await?;
        if order.status != OrderStatus::Paid {
            return Err(ServiceError::InvalidTransition {
                entity: "message",
                from: format!("{} (order {})", message.status, order.status),
                to: "sending".to_string(),
            });
        }

        self.messages
            .update(message.id, MessageTransition::Sending)
            .await?;

        let outcome = match self.sms.dispatch(&message.recipient_phone, &message.content).await {
            Ok(outcome) => outcome,
            Err(ServiceError::DeliveryError { reason, code }) => {
                DispatchOutcome::rejected(reason, code)
            }
            Err(e) => DispatchOutcome::rejected(e.to_string(), None),
        };

        if let (true, Some(provider_message_id)) = (outcome.success, outcome.provider_message_id) {
            self.messages
                .update(
                    message.id,
                    MessageTransition::Sent {
                        provider_message_id: provider_message_id.clone(),
                        at: Utc::now(),
                    },
                )
                .await?;
            Counters::bump(&self.counters.delivered);
            info!(message_id = %message.id, provider = self.sms.name(), %provider_message_id, "message sent");
            return Ok(());
        }

        let reason = outcome
            .error
            .unwrap_or_else(|| "unknown delivery error".to_string());
        Counters::bump(&self.counters.delivery_failures);
        warn!(
            message_id = %message.id,
            provider = self.sms.name(),
            code = outcome.error_code.as_deref().unwrap_or("-"),
            %reason,
            "delivery failed, refunding"
        );
        self.messages
            .update(message.id, MessageTransition::Failed { reason })
            .await?;

        self.compensate(order).await
    }

    /// Single refund attempt for an undeliverable message. A rejected refund
    /// is not retried: it is logged and counted so it can be reconciled by
    /// hand.
    async fn compensate(&self, order: Order) -> Result<()> {
        // Refunds are not idempotent; re-read to be sure nobody beat us to it.
        let current = self.orders.get(order.id).await?;
        if current.status != OrderStatus::Paid {
            warn!(order_id = %order.id, status = %current.status, "order no longer paid, skipping refund");
            return Ok(());
        }

        let outcome = match self.payments.refund(order.id, order.amount, REFUND_REASON).await {
            Ok(outcome) => outcome,
            Err(e) => PaymentOutcome::declined(e.to_string()),
        };
        let Some(refund_transaction_id) = outcome.confirmed_transaction() else {
            Counters::bump(&self.counters.unreconciled_refunds);
            error!(
                order_id = %order.id,
                order_no = %order.order_no,
                amount = %order.amount,
                error = %outcome.error_message(),
                "refund failed, order left paid and needs manual reconciliation"
            );
            return Ok(());
        };

        let processed_at = Utc::now();
        self.orders
            .update_status(order.id, OrderTransition::Refunded { at: processed_at })
            .await?;
        self.refunds
            .insert(RefundRecord::completed(
                order.id,
                order.amount,
                REFUND_REASON,
                refund_transaction_id,
                processed_at,
            ))
            .await?;
        self.billing
            .record(
                &order.user_id,
                Some(order.id),
                BillKind::Refund,
                order.amount,
                format!("Refund for order {}: {REFUND_REASON}", order.order_no),
            )
            .await?;

        Counters::bump(&self.counters.refunds_issued);
        info!(order_id = %order.id, amount = %order.amount, %refund_transaction_id, "order refunded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageStatus;
    use crate::gateway::ApprovalPolicy;
    use crate::gateway::payment::MockPaymentGateway;
    use crate::gateway::sms::MockSmsGateway;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn coordinator(charge: ApprovalPolicy, delivery: ApprovalPolicy) -> Coordinator {
        Coordinator::new(
            Stores::shared(InMemoryStore::new()),
            Arc::new(MockPaymentGateway::instant(charge)),
            Arc::new(MockSmsGateway::new(delivery)),
        )
    }

    fn request(content: &str) -> SendRequest {
        SendRequest {
            user_id: "alice".to_string(),
            recipient: "13800000000".to_string(),
            content: content.to_string(),
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn test_send_returns_pending_message() {
        let coordinator = coordinator(ApprovalPolicy::Always, ApprovalPolicy::Always);
        let message = coordinator.send(request("hello")).await.unwrap();

        assert_eq!(message.status, MessageStatus::Pending);
        assert_eq!(message.cost.value(), dec!(1.00));
        assert_eq!(message.character_count, 5);

        let order = coordinator.order("alice", message.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.message_id, Some(message.id));
        assert_eq!(order.description, "SMS send - 5 chars");

        coordinator.drain().await;
    }

    #[tokio::test]
    async fn test_validation_mutates_nothing() {
        let coordinator = coordinator(ApprovalPolicy::Always, ApprovalPolicy::Always);

        let mut missing_phone = request("hello");
        missing_phone.recipient = " ".to_string();
        assert!(matches!(
            coordinator.send(missing_phone).await,
            Err(ServiceError::ValidationError(_))
        ));

        assert!(matches!(
            coordinator.send(request("")).await,
            Err(ServiceError::ValidationError(_))
        ));

        let mut anonymous = request("hello");
        anonymous.user_id = String::new();
        assert!(matches!(
            coordinator.send(anonymous).await,
            Err(ServiceError::AuthError(_))
        ));

        assert!(coordinator.orders().list_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_message_is_parked() {
        let coordinator = coordinator(ApprovalPolicy::Always, ApprovalPolicy::Always);
        let mut req = request("later");
        req.scheduled_at = Some(Utc::now() + chrono::Duration::hours(1));

        let message = coordinator.send(req).await.unwrap();
        coordinator.drain().await;

        assert_eq!(message.status, MessageStatus::Scheduled);
        let stored = coordinator.message("alice", message.id).await.unwrap();
        assert_eq!(stored.status, MessageStatus::Scheduled);
        assert_eq!(coordinator.stats(), CoordinatorStats::default());
    }

    #[tokio::test]
    async fn test_message_of_other_user_is_hidden() {
        let coordinator = coordinator(ApprovalPolicy::Always, ApprovalPolicy::Always);
        let message = coordinator.send(request("hello")).await.unwrap();
        coordinator.drain().await;

        let result = coordinator.message("mallory", message.id).await;
        assert!(matches!(result, Err(ServiceError::NotFoundError { .. })));
    }

    #[tokio::test]
    async fn test_client_pay_params_only_for_pending_orders() {
        let coordinator = coordinator(ApprovalPolicy::Always, ApprovalPolicy::Always);
        let message = coordinator.send(request("hello")).await.unwrap();
        coordinator.drain().await;

        let paid = coordinator.client_pay_params("alice", message.order_id).await;
        assert!(matches!(paid, Err(ServiceError::ValidationError(_))));

        let order = coordinator
            .orders()
            .create_order("alice", Money::new(dec!(1.00)).unwrap(), "top up")
            .await
            .unwrap();
        let params = coordinator.client_pay_params("alice", order.id).await.unwrap();
        assert_eq!(params.app_id, "mock_app_id");
    }

    #[tokio::test]
    async fn test_payment_record_per_attempt() {
        let coordinator = coordinator(ApprovalPolicy::Never, ApprovalPolicy::Always);
        let err = coordinator.send(request("hello")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PaymentError(_)));

        let orders = coordinator.orders().list_for_user("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        let records = coordinator
            .payment_records("alice", orders[0].id)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_charge_without_transaction_id_is_flagged() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/charges")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let credentials = crate::config::PaymentCredentials {
            app_id: "wx_app".to_string(),
            merchant_id: "1900000001".to_string(),
            merchant_key: "secret-key".to_string(),
            cert_path: None,
            key_path: None,
            gateway_url: server.url(),
            notify_url: None,
        };
        let coordinator = Coordinator::new(
            Stores::shared(InMemoryStore::new()),
            Arc::new(crate::gateway::payment::HttpPaymentGateway::new(&credentials).unwrap()),
            Arc::new(MockSmsGateway::new(ApprovalPolicy::Always)),
        );

        let err = coordinator.send(request("hello")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PaymentError(ref reason) if reason.contains("no transaction id")));
        assert_eq!(coordinator.stats().unconfirmed_charges, 1);

        let orders = coordinator.orders().list_for_user("alice").await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert!(coordinator.messages("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plain_decline_is_not_flagged() {
        let coordinator = coordinator(ApprovalPolicy::Never, ApprovalPolicy::Always);
        assert!(coordinator.send(request("hello")).await.is_err());
        assert_eq!(coordinator.stats().unconfirmed_charges, 0);
    }
}
