use crate::domain::booking::BookingStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),
    #[error("Booking {id} cannot be cancelled while {status:?}")]
    InvalidBookingState { id: Uuid, status: BookingStatus },
    #[error("Refund not allowed {days_before_tour} day(s) before the tour")]
    RefundNotAllowed { days_before_tour: i64 },
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),
    #[error("Tour {0} not found")]
    TourNotFound(Uuid),
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),
    #[error("Availability slot {0} not found")]
    SlotNotFound(Uuid),
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for SettlementError {
    fn from(err: rocksdb::Error) -> Self {
        SettlementError::InternalError(Box::new(err))
    }
}

impl SettlementError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        SettlementError::Conflict(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SettlementError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
