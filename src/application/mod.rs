//! Application layer orchestrating the send lifecycle.
//!
//! [`coordinator::Coordinator`] is the entry point: it prices a message,
//! settles the order through [`order_ledger::OrderLedger`], records bills via
//! [`billing::BillingLedger`] and dispatches delivery on background tasks.

pub mod billing;
pub mod coordinator;
pub mod order_ledger;
