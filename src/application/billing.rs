use crate::domain::bill::{Bill, BillKind};
use crate::domain::money::Money;
use crate::domain::ports::BillStoreRef;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Totals derived from a user's bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct BillSummary {
    pub total_payment: Money,
    pub total_refund: Money,
}

/// Append-only ledger of balance-affecting events.
///
/// Each bill snapshots the user's wallet balance before and after the event.
/// Only `recharge` and `consumption` move the wallet; payments and refunds
/// settle through the external processor and leave it unchanged.
pub struct BillingLedger {
    bills: BillStoreRef,
    append_lock: Mutex<()>,
}

impl BillingLedger {
    pub fn new(bills: BillStoreRef) -> Self {
        Self {
            bills,
            append_lock: Mutex::new(()),
        }
    }

    pub async fn record(
        &self,
        user_id: &str,
        order_id: Option<Uuid>,
        kind: BillKind,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Bill> {
        // Serialized so that each snapshot chains from the previous one.
        let _guard = self.append_lock.lock().await;

        let balance_before = self.balance(user_id).await?;
        let balance_after = match kind {
            BillKind::Recharge => balance_before + amount,
            BillKind::Consumption => balance_before.checked_sub(amount).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "insufficient balance: {balance_before} < {amount}"
                ))
            })?,
            BillKind::Payment | BillKind::Refund => balance_before,
        };

        let bill = Bill {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            order_id,
            kind,
            amount,
            balance_before,
            balance_after,
            description: description.into(),
            created_at: Utc::now(),
        };
        self.bills.append(bill.clone()).await?;
        info!(bill_id = %bill.id, user_id, kind = %kind, %amount, "bill recorded");
        Ok(bill)
    }

    /// Wallet balance after the user's latest bill; zero without history.
    pub async fn balance(&self, user_id: &str) -> Result<Money> {
        Ok(self
            .bills
            .list_by_user(user_id)
            .await?
            .first()
            .map(|latest| latest.balance_after)
            .unwrap_or(Money::ZERO))
    }

    /// Newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Bill>> {
        self.bills.list_by_user(user_id).await
    }

    pub async fn summarize(&self, user_id: &str) -> Result<BillSummary> {
        let bills = self.bills.list_by_user(user_id).await?;
        let total = |kind: BillKind| {
            bills
                .iter()
                .filter(|b| b.kind == kind)
                .map(|b| b.amount)
                .sum::<Money>()
        };
        Ok(BillSummary {
            total_payment: total(BillKind::Payment),
            total_refund: total(BillKind::Refund),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ledger() -> BillingLedger {
        BillingLedger::new(Arc::new(InMemoryStore::new()))
    }

    fn money(value: rust_decimal::Decimal) -> Money {
        Money::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_summary_without_bills_is_zero() {
        let summary = ledger().summarize("nobody").await.unwrap();
        assert_eq!(summary, BillSummary::default());
        assert_eq!(summary.total_payment, Money::ZERO);
    }

    #[tokio::test]
    async fn test_summary_sums_by_kind() {
        let ledger = ledger();
        ledger
            .record("alice", None, BillKind::Payment, money(dec!(5.00)), "SMS")
            .await
            .unwrap();
        ledger
            .record("alice", None, BillKind::Refund, money(dec!(5.00)), "refund")
            .await
            .unwrap();
        ledger
            .record("bob", None, BillKind::Payment, money(dec!(7.00)), "SMS")
            .await
            .unwrap();

        let summary = ledger.summarize("alice").await.unwrap();
        assert_eq!(summary.total_payment.value(), dec!(5.00));
        assert_eq!(summary.total_refund.value(), dec!(5.00));
    }

    #[tokio::test]
    async fn test_balance_snapshots_chain() {
        let ledger = ledger();
        let recharge = ledger
            .record("alice", None, BillKind::Recharge, money(dec!(10.00)), "top up")
            .await
            .unwrap();
        assert_eq!(recharge.balance_before, Money::ZERO);
        assert_eq!(recharge.balance_after.value(), dec!(10.00));

        let spend = ledger
            .record("alice", None, BillKind::Consumption, money(dec!(3.00)), "SMS")
            .await
            .unwrap();
        assert_eq!(spend.balance_before.value(), dec!(10.00));
        assert_eq!(spend.balance_after.value(), dec!(7.00));

        let payment = ledger
            .record("alice", None, BillKind::Payment, money(dec!(1.00)), "SMS")
            .await
            .unwrap();
        assert_eq!(payment.balance_before, payment.balance_after);

        assert_eq!(ledger.balance("alice").await.unwrap().value(), dec!(7.00));
        assert_eq!(ledger.list("alice").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overdraft_rejected() {
        let ledger = ledger();
        let result = ledger
            .record("alice", None, BillKind::Consumption, money(dec!(1.00)), "SMS")
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        assert!(ledger.list("alice").await.unwrap().is_empty());
    }
}
