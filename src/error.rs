use thiserror::Error;

/// Errors surfaced by the send pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Unauthorized: {0}")]
    AuthError(String),
    #[error("{entity} not found: {id}")]
    NotFoundError { entity: &'static str, id: String },
    #[error("Persistence error: {0}")]
    PersistenceError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Payment failed: {0}")]
    PaymentError(String),
    #[error("Delivery failed: {reason}")]
    DeliveryError { reason: String, code: Option<String> },
    #[error("Illegal {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFoundError {
            entity,
            id: id.to_string(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError(Box::new(std::io::Error::other(message.into())))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ServiceError {
    fn from(err: rocksdb::Error) -> Self {
        Self::PersistenceError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
