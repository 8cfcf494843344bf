use crate::domain::message::Message;
use crate::domain::money::Money;
use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

/// One line of the send report.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRow {
    pub message: Option<Uuid>,
    pub user: String,
    pub order: Option<String>,
    pub status: String,
    /// Always two decimal places.
    pub cost: String,
    pub reason: Option<String>,
}

impl ReportRow {
    /// Final state of an accepted message and its order.
    pub fn settled(message: &Message, order: &Order) -> Self {
        Self {
            message: Some(message.id),
            user: message.user_id.clone(),
            order: Some(order.order_no.clone()),
            status: format!("{}/{}", message.status, order.status),
            cost: message.cost.to_string(),
            reason: message.failed_reason.clone(),
        }
    }

    /// A request the coordinator turned down before a message existed.
    pub fn rejected(user: &str, cost: Money, reason: impl ToString) -> Self {
        Self {
            message: None,
            user: user.to_string(),
            order: None,
            status: "rejected".to_string(),
            cost: cost.to_string(),
            reason: Some(reason.to_string()),
        }
    }
}

/// Writes the send report as CSV with the header
/// `message,user,order,status,cost,reason`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rows(&mut self, rows: impl IntoIterator<Item = ReportRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
