use crate::application::coordinator::SendRequest;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct RequestRow {
    user: String,
    phone: String,
    content: String,
    #[serde(default)]
    scheduled_at: Option<DateTime<Utc>>,
}

impl From<RequestRow> for SendRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            user_id: row.user,
            recipient: row.phone,
            content: row.content,
            scheduled_at: row.scheduled_at,
        }
    }
}

/// Reads send requests from a CSV source with the header
/// `user,phone,content,scheduled_at`.
///
/// Surrounding whitespace is trimmed and the trailing `scheduled_at` column
/// may be omitted; an empty value means "send now".
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one request per row.
    pub fn requests(self) -> impl Iterator<Item = Result<SendRequest>> {
        self.reader
            .into_deserialize::<RequestRow>()
            .map(|row| row.map(SendRequest::from).map_err(ServiceError::from))
    }
}
