//! Domain model: entities, their state machines and the storage ports.

pub mod bill;
pub mod message;
pub mod money;
pub mod order;
pub mod payment_record;
pub mod ports;
pub mod pricing;
pub mod refund;
